//! Price list ingestion through uploads and the device intake.

mod common;

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{price_sheet, TestHarness};
use rust_decimal::Decimal;
use secrecy::SecretString;

use optiplan::db::price_repo::{self, PriceJobStatus, PriceUploadJob};
use optiplan::db::Database;
use optiplan::pricing::columns::{URUN_ADI, URUN_KODU};
use optiplan::pricing::{
    normalize_columns, CancelFlag, ColumnAlias, ColumnAliases, DeviceIntake, OcrBackend,
    OcrRequest, PriceUpload,
};
use optiplan::IngestError;

struct FixedOcr(&'static str);

impl OcrBackend for FixedOcr {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn recognize(&self, _request: &OcrRequest<'_>) -> Result<String, IngestError> {
        Ok(self.0.to_string())
    }
}

fn png() -> Vec<u8> {
    let img = image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
        40,
        20,
        image::Luma([255u8]),
    ));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

fn wait_for_job(db: &Database, job_id: &str) -> PriceUploadJob {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let job = db
            .with_conn(|conn| price_repo::find_job(conn, job_id))
            .unwrap()
            .unwrap();
        if matches!(job.status, PriceJobStatus::Completed | PriceJobStatus::Failed) {
            return job;
        }
        assert!(Instant::now() < deadline, "job {} never finished", job_id);
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_alias_collision_first_wins() {
    let aliases = ColumnAliases::new(vec![ColumnAlias::new(
        URUN_KODU,
        &["Ürün Kodu", "urun kodu"],
    )]);
    let mapping = normalize_columns(&["Ürün Kodu", "urun kodu", "Fiyat"], &aliases);

    let targets: Vec<(&str, &str)> = mapping.iter().collect();
    assert_eq!(targets, vec![("Ürün Kodu", URUN_KODU)]);
}

#[test]
fn test_normalizer_never_repeats_a_canonical() {
    let aliases = ColumnAliases::default();
    let observed = [
        "Ürün Adı", "Stok Adı", "Açıklama", "Fiyat", "Liste Fiyatı", "KDV", "VAT", "Marka",
        "Brand", "Bilinmeyen",
    ];

    let first = normalize_columns(&observed, &aliases);
    let second = normalize_columns(&observed, &aliases);
    assert_eq!(first, second);

    let mut canonicals: Vec<&str> = first.iter().map(|(_, c)| c).collect();
    let total = canonicals.len();
    canonicals.sort();
    canonicals.dedup();
    assert_eq!(canonicals.len(), total);
    assert_eq!(first.canonical_for("Ürün Adı"), Some(URUN_ADI));
}

#[test]
fn test_turkish_spreadsheet_upload() {
    let harness = TestHarness::new();
    let sheet = price_sheet(
        &["Stok Kodu", "Ürün Adı", "Birim", "Liste Fiyatı", "İskonto", "KDV %", "Döviz"],
        &[
            &["MDF-18", "MDF 18mm Beyaz", "m2", "1.250,50", "%10", "20", "TL"],
            &["SNT-8", "Sunta 8mm", "", "₺ 480", "", "", ""],
        ],
    );

    let pipeline = harness.price_pipeline();
    let (job_id, rows) = pipeline
        .ingest(
            PriceUpload::new("kastamonu.xlsx", sheet).with_supplier("Kastamonu"),
            &CancelFlag::new(),
        )
        .unwrap();
    assert_eq!(rows, 2);

    let items = harness
        .db
        .with_conn(|conn| price_repo::items_for_job(conn, &job_id))
        .unwrap();
    assert_eq!(items[0].product_code.as_deref(), Some("MDF-18"));
    assert_eq!(items[0].list_price, Some(Decimal::new(125050, 2)));
    assert_eq!(items[0].discount_rate, Some(Decimal::from(10)));
    assert_eq!(items[0].unit, "m2");
    assert_eq!(items[0].currency, "TRY");
    assert_eq!(items[1].list_price, Some(Decimal::from(480)));
    assert_eq!(items[1].unit, "ADET");
}

#[test]
fn test_oversized_upload_rejected_before_storage() {
    let harness = TestHarness::new();
    let pipeline = harness.price_pipeline().with_max_upload_bytes(16);
    let err = pipeline
        .ingest(PriceUpload::new("big.xlsx", vec![0u8; 17]), &CancelFlag::new())
        .unwrap_err();
    assert!(matches!(err, IngestError::TooLarge { size: 17, limit: 16 }));
}

#[test]
fn test_device_image_goes_through_ocr() {
    let harness = TestHarness::new();
    let pipeline = Arc::new(harness.price_pipeline_with_ocr(Arc::new(FixedOcr(
        "Ürün Kodu  Ürün Adı  Fiyat\nMDF-18  MDF 18mm Beyaz  1.250,50\n",
    ))));
    let (intake, handle) =
        DeviceIntake::start(pipeline, SecretString::from("device-key"), 1024 * 1024).unwrap();

    assert!(matches!(
        intake.submit("wrong", PriceUpload::new("scan.png", png())),
        Err(IngestError::Unauthorized)
    ));
    assert!(matches!(
        intake.submit("device-key", PriceUpload::new("liste.xlsx", vec![1, 2, 3])),
        Err(IngestError::UnsupportedExtension(_))
    ));

    let job_id = intake
        .submit("device-key", PriceUpload::new("scan.png", png()))
        .unwrap();
    let job = wait_for_job(&harness.db, &job_id);
    assert_eq!(job.status, PriceJobStatus::Completed, "{:?}", job.error_message);
    assert_eq!(job.rows_extracted, 1);

    let items = harness
        .db
        .with_conn(|conn| price_repo::items_for_job(conn, &job_id))
        .unwrap();
    assert_eq!(items[0].product_name, "MDF 18mm Beyaz");
    assert_eq!(items[0].list_price, Some(Decimal::new(125050, 2)));

    drop(intake);
    handle.join().unwrap();
}

#[test]
fn test_device_job_fails_without_ocr() {
    let harness = TestHarness::new();
    let (intake, handle) = DeviceIntake::start(
        Arc::new(harness.price_pipeline()),
        SecretString::from("device-key"),
        1024 * 1024,
    )
    .unwrap();

    let job_id = intake
        .submit("device-key", PriceUpload::new("scan.png", png()))
        .unwrap();
    let job = wait_for_job(&harness.db, &job_id);
    assert_eq!(job.status, PriceJobStatus::Failed);
    assert!(job.error_message.is_some());

    drop(intake);
    handle.join().unwrap();
}
