//! End-to-end export: compliance, grouping, workbook output and persistence.

mod common;

use common::{OrderBuilder, TestHarness};
use rust_decimal::Decimal;

use optiplan::compliance::{ComplianceAgent, CompliancePipeline, PartTypeRulesAgent, Severity};
use optiplan::db::{artifact_repo, order_repo, outbox_repo};
use optiplan::export::{group_parts, validate_workbook_path, PartBin};
use optiplan::order::{OrderPart, OrderStatus, PartGroup};
use optiplan::ExportError;

fn s1_parts() -> (OrderPart, OrderPart) {
    let arkalik = OrderPart::new(PartGroup::Arkalik, 700, 540, 1)
        .with_grain("1")
        .with_edges("Red", "", "", "");
    let govde = OrderPart::new(PartGroup::Govde, 720, 560, 1)
        .with_grain("2")
        .with_edges("Green", "", "", "");
    (arkalik, govde)
}

#[test]
fn test_arkalik_cleanup_with_drilling_is_rejected() {
    let (arkalik, govde) = s1_parts();
    let order = OrderBuilder::new("Ahmet")
        .part(arkalik.with_drilling("D8", None))
        .part(govde)
        .build();

    let result = CompliancePipeline::standard().run(order.clone());
    assert!(!result.ok);
    assert!(result.data.is_none());
    let severities: Vec<Severity> = result.report.iter().map(|f| f.severity).collect();
    assert_eq!(severities, vec![Severity::Warn, Severity::Error]);

    let cleaned = PartTypeRulesAgent.apply(order).order;
    assert!(cleaned.parts[0].edge_banding_u1.is_none());
    assert_eq!(cleaned.parts[1].edge_banding_u1.as_deref(), Some("Green"));
}

#[test]
fn test_happy_path_maps_grain() {
    let (arkalik, govde) = s1_parts();
    let order = OrderBuilder::new("Ahmet").part(arkalik).part(govde).build();

    let result = CompliancePipeline::standard().run(order);
    assert!(result.ok);
    assert!(result.errors().next().is_none());

    let data = result.data.unwrap();
    assert_eq!(data.parts[0].grain_opti, Some(1));
    assert_eq!(data.parts[1].grain_opti, Some(2));
    assert!(!data.parts[0].has_edge_banding());
}

#[test]
fn test_compliance_is_idempotent() {
    let (arkalik, govde) = s1_parts();
    let order = OrderBuilder::new("Ahmet").part(arkalik).part(govde).build();

    let pipeline = CompliancePipeline::standard();
    let first = pipeline.run(order).data.unwrap();
    let second = pipeline.run(first.clone());
    assert!(second.ok);
    assert!(second.report.is_empty());
    assert_eq!(second.data.unwrap(), first);
}

#[test]
fn test_one_warning_per_banded_arkalik_part() {
    let mut builder = OrderBuilder::new("Ahmet");
    for i in 0..4 {
        let part = OrderPart::new(PartGroup::Arkalik, 500 + i, 400, 1).with_grain("0");
        let part = if i % 2 == 0 {
            part.with_edges("", "1", "", "")
        } else {
            part
        };
        builder = builder.part(part);
    }

    let result = CompliancePipeline::standard().run(builder.build());
    assert!(result.ok);
    let warns = result
        .report
        .iter()
        .filter(|f| f.severity == Severity::Warn)
        .count();
    assert_eq!(warns, 2);
    assert!(result
        .data
        .unwrap()
        .parts
        .iter()
        .all(|p| p.edges().iter().all(Option::is_none)));
}

#[test]
fn test_invalid_grain_blocks() {
    let order = OrderBuilder::new("Ahmet").govde(720, 560, "diagonal").build();
    assert!(!CompliancePipeline::standard().run(order).ok);

    let mut order = OrderBuilder::new("Ahmet").govde(720, 560, "1").build();
    order.parts[0].grain = None;
    assert!(!CompliancePipeline::standard().run(order).ok);
}

#[test]
fn test_grouping_and_two_files() {
    let harness = TestHarness::new();
    let order = OrderBuilder::new("Ahmet Usta")
        .thickness(18)
        .color("Beyaz")
        .govde(720, 560, "1")
        .govde(600, 560, "2")
        .arkalik(700, 540, "0")
        .build();

    let bins = group_parts(&order);
    assert_eq!(bins.len(), 2);
    assert_eq!(bins[0].0, PartBin::new(PartGroup::Govde, Decimal::from(18), "Beyaz"));
    assert_eq!(bins[0].1.len(), 2);
    assert_eq!(bins[1].0, PartBin::new(PartGroup::Arkalik, Decimal::from(8), "Beyaz"));
    assert_eq!(bins[1].1.len(), 1);

    let outcome = harness.export_pipeline().run(order.clone(), Some("planner")).unwrap();
    assert_eq!(outcome.artifacts.len(), 2);
    assert_eq!(outcome.order.status, OrderStatus::Exported);

    let files = harness.exported_files();
    assert_eq!(files.len(), 2);
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("Ahmet_Usta_") && n.ends_with("_18mm_Beyaz_GOVDE.xlsx")));
    assert!(names.iter().any(|n| n.ends_with("_8mm_Beyaz_ARKALIK.xlsx")));
    assert_eq!(harness.all_export_entries(), 2);

    let artifacts = harness
        .db
        .with_conn(|conn| artifact_repo::for_order(conn, &order.id))
        .unwrap();
    assert_eq!(artifacts.len(), 2);
}

#[test]
fn test_every_written_workbook_passes_contract() {
    let harness = TestHarness::new();
    let order = OrderBuilder::new("Mehmet")
        .part(
            OrderPart::new(PartGroup::Govde, 720, 560, 2)
                .with_grain("1-Boyuna")
                .with_edges("1", "Beyaz PVC", "", "2")
                .with_drilling("D8", Some("D5"))
                .with_description("yan dikme"),
        )
        .arkalik(700, 540, "3-Material")
        .build();

    harness.export_pipeline().run(order, None).unwrap();
    for file in harness.exported_files() {
        let report = validate_workbook_path(&file).unwrap();
        assert!(report.ok, "{}: {:?}", file.display(), report.mismatches);
    }
}

#[test]
fn test_rejected_order_leaves_nothing_behind() {
    let harness = TestHarness::new();
    let order = OrderBuilder::new("Ahmet")
        .part(
            OrderPart::new(PartGroup::Arkalik, 700, 540, 1)
                .with_grain("0")
                .with_drilling("D8", None),
        )
        .build();

    let err = harness.export_pipeline().run(order.clone(), None).unwrap_err();
    match err {
        ExportError::RuleViolation { findings } => {
            assert!(findings.iter().any(|f| f.is_error()))
        }
        other => panic!("unexpected error: {}", other),
    }

    assert_eq!(harness.all_export_entries(), 0);
    let stored = harness
        .db
        .with_conn(|conn| order_repo::find_by_id(conn, &order.id))
        .unwrap();
    assert!(stored.is_none());
    let outbox = harness
        .db
        .with_conn(|conn| outbox_repo::for_entity(conn, "order", &order.id))
        .unwrap();
    assert!(outbox.is_empty());
}

#[test]
fn test_worker_pool_exports_orders_in_parallel() {
    use std::sync::Arc;

    use optiplan::worker::{ExportJob, WorkerPool};

    let harness = TestHarness::new();
    let pool = WorkerPool::new(Arc::new(harness.export_pipeline()), 2).unwrap();

    for customer in ["Ali", "Veli", "Can"] {
        let order = OrderBuilder::new(customer).govde(720, 560, "1").build();
        pool.submit(ExportJob::new(order).by("test")).unwrap();
    }

    let results: Vec<_> = (0..3).filter_map(|_| pool.recv_result()).collect();
    pool.shutdown();
    pool.wait();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.success));
    assert_eq!(harness.exported_files().len(), 3);
}
