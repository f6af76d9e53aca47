use std::path::PathBuf;

use serde_json::json;
use tracing::{debug, info, info_span, warn};

use crate::audit::{self, AuditAction, AuditEvent};
use crate::compliance::{CompliancePipeline, Finding};
use crate::db::artifact_repo::{self, ExportArtifact};
use crate::db::outbox_repo::{self, Operation};
use crate::db::{order_repo, Database};
use crate::error::{ExportError, ValidationError};
use crate::export::{group_parts, Renderer, TemplateWriter};
use crate::order::lifecycle::{self, ORDER_ENTITY};
use crate::order::{Order, OrderStatus};
use crate::sanitize;
use crate::storage::FileStorage;

use super::config::PipelineConfig;
use super::context::{ExportContext, ExportOutcome};
use super::locks::OrderLocks;

pub struct ExportPipeline {
    config: PipelineConfig,
    compliance: CompliancePipeline,
    writer: TemplateWriter,
    db: Database,
    locks: OrderLocks,
}

impl ExportPipeline {
    /// Production constructor: standard agents, files under the configured
    /// export directory.
    pub fn from_config(config: PipelineConfig, db: Database) -> Self {
        let writer = TemplateWriter::new(FileStorage::new(&config.export_directory));
        Self {
            config,
            compliance: CompliancePipeline::standard(),
            writer,
            db,
            locks: OrderLocks::new(),
        }
    }

    /// Inject a specific agent chain.
    pub fn with_compliance(mut self, compliance: CompliancePipeline) -> Self {
        self.compliance = compliance;
        self
    }

    /// Replace the workbook renderer. Every rendered workbook is still
    /// checked against the template contract before it is staged.
    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.writer = self.writer.with_renderer(renderer);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Moves a stored order to `to` with the same outbox budget exports use.
    pub fn transition(
        &self,
        order_id: &str,
        to: OrderStatus,
        actor: Option<&str>,
    ) -> crate::error::Result<OrderStatus> {
        lifecycle::transition(&self.db, order_id, to, actor, self.config.outbox_max_retries)
    }

    /// Runs the full export for one order.
    ///
    /// Concurrent runs for the same order id are serialized. On any failure
    /// no workbook is left in the export directory and nothing is persisted
    /// except the EXPORT_REJECTED audit row for compliance failures.
    pub fn run(&self, order: Order, actor: Option<&str>) -> Result<ExportOutcome, ExportError> {
        let order_id = order.id.clone();
        self.locks
            .with_lock(&order_id, || self.run_locked(ExportContext::new(order, actor)))
    }

    fn run_locked(&self, mut ctx: ExportContext) -> Result<ExportOutcome, ExportError> {
        let _pipeline_span = info_span!("export",
            order_id = %ctx.order.id,
            token = %sanitize::redact_token(&ctx.order.tracking_token),
            parts = ctx.order.parts.len(),
        )
        .entered();

        // Step 1: Structural validation
        {
            let _step = info_span!("validate").entered();
            ctx.order.validate()?;
        }

        // Step 2: Compliance agents
        {
            let _step = info_span!("compliance").entered();
            self.step_compliance(&mut ctx)?;
        }

        // Step 3: Group into bins
        {
            let _step = info_span!("group").entered();
            self.step_group(&mut ctx)?;
        }

        // Step 4: Render and stage workbooks
        {
            let _step = info_span!("write").entered();
            self.step_write(&mut ctx)?;
        }

        // Step 5: Persist and publish
        let _step = info_span!("persist").entered();
        self.step_persist(ctx)
    }

    fn step_compliance(&self, ctx: &mut ExportContext) -> Result<(), ExportError> {
        let result = self.compliance.run(ctx.order.clone());
        ctx.findings = result.report;

        if !result.ok {
            let errors: Vec<&Finding> = ctx.findings.iter().filter(|f| f.is_error()).collect();
            warn!("Export rejected with {} error finding(s)", errors.len());

            let detail = errors
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            let event = AuditEvent::new(AuditAction::ExportRejected, detail)
                .by(ctx.actor.as_deref())
                .for_order(&ctx.order.id);
            if let Err(e) = self.db.with_conn(|conn| audit::record(conn, &event)) {
                warn!("Failed to record export rejection: {}", e);
            }

            return Err(ExportError::RuleViolation {
                findings: std::mem::take(&mut ctx.findings),
            });
        }

        ctx.compliant = result.data;
        Ok(())
    }

    fn step_group(&self, ctx: &mut ExportContext) -> Result<(), ExportError> {
        let order = compliant(ctx)?;
        let bins = group_parts(order);
        debug!("Grouped {} part(s) into {} bin(s)", order.parts.len(), bins.len());
        ctx.bins = bins;
        Ok(())
    }

    fn step_write(&self, ctx: &mut ExportContext) -> Result<(), ExportError> {
        let order = compliant(ctx)?;
        let mut staged = Vec::with_capacity(ctx.bins.len());
        for (bin, parts) in &ctx.bins {
            // An early return drops `staged`, which removes the temp files.
            staged.push(self.writer.stage(order, bin, parts, ctx.exported_at)?);
        }
        ctx.staged = staged;
        Ok(())
    }

    fn step_persist(&self, mut ctx: ExportContext) -> Result<ExportOutcome, ExportError> {
        let mut order = ctx
            .compliant
            .take()
            .ok_or_else(|| ValidationError::new("order", "compliance did not run"))?;
        let staged = std::mem::take(&mut ctx.staged);
        let actor = ctx.actor.as_deref();
        let exported_at = ctx.exported_at;
        let max_retries = self.config.outbox_max_retries;

        // Paths published inside the transaction, removed again if it fails.
        let mut published: Vec<PathBuf> = Vec::new();

        let result = self.db.with_tx(|tx| {
            let existing = order_repo::status_of(tx, &order.id)?;
            if let Some(status) = existing {
                if !status.is_exportable() {
                    return Err(ExportError::Validation(ValidationError::new(
                        "status",
                        format!("order in status {} cannot be exported", status),
                    )));
                }
                order.status = status;
            } else {
                order.status = OrderStatus::New;
            }

            order_repo::upsert(tx, &order)?;

            let mut from = order.status;
            for next in [OrderStatus::Validated, OrderStatus::Exported] {
                if from.can_transition_to(next) {
                    order_repo::set_status(tx, &order.id, next, exported_at)?;
                    audit::record(
                        tx,
                        &AuditEvent::new(
                            AuditAction::OrderStatusChanged,
                            format!("{} -> {}", from, next),
                        )
                        .by(actor)
                        .for_order(&order.id)
                        .at(exported_at),
                    )?;
                    from = next;
                }
            }
            order.status = from;

            let mut artifacts = Vec::with_capacity(staged.len());
            for item in staged {
                let file_name = item.file.filename().to_string();
                let path = item.file.commit()?;
                published.push(path.clone());

                let artifact = ExportArtifact {
                    order_id: order.id.clone(),
                    part_group: item.bin.part_group,
                    thickness_mm: item.bin.thickness_mm,
                    color: item.bin.color.clone(),
                    file_name: path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(str::to_string)
                        .unwrap_or(file_name),
                    file_path: path,
                    row_count: item.row_count,
                    created_at: exported_at,
                };
                artifact_repo::insert(tx, &artifact)?;
                artifacts.push(artifact);
            }

            audit::record(
                tx,
                &AuditEvent::new(
                    AuditAction::OrderExported,
                    format!("{} file(s)", artifacts.len()),
                )
                .by(actor)
                .for_order(&order.id)
                .at(exported_at),
            )?;

            let operation = if existing.is_some() {
                Operation::Update
            } else {
                Operation::Create
            };
            outbox_repo::enqueue(
                tx,
                ORDER_ENTITY,
                &order.id,
                operation,
                &outbox_payload(&order),
                max_retries,
            )?;

            Ok(artifacts)
        });

        match result {
            Ok(artifacts) => {
                info!("Exported order into {} file(s)", artifacts.len());
                let findings = std::mem::take(&mut ctx.findings);
                Ok(ExportOutcome {
                    order,
                    findings,
                    artifacts,
                })
            }
            Err(e) => {
                for path in &published {
                    if let Err(remove_err) = std::fs::remove_file(path) {
                        warn!(
                            "Failed to remove {} after rollback: {}",
                            sanitize::redact_path(path),
                            remove_err
                        );
                    }
                }
                Err(e)
            }
        }
    }
}

fn compliant(ctx: &ExportContext) -> Result<&Order, ExportError> {
    ctx.compliant
        .as_ref()
        .ok_or_else(|| ValidationError::new("order", "compliance did not run").into())
}

fn outbox_payload(order: &Order) -> serde_json::Value {
    json!({
        "id": order.id,
        "customer_name": order.customer_name,
        "status": order.status.as_str(),
        "material": {
            "name": order.material.name,
            "thickness_mm": order.material.thickness_mm.normalize().to_string(),
            "color": order.material.color,
        },
        "part_count": order.parts.len(),
    })
}
