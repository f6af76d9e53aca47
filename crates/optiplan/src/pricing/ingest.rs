use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, info_span, warn};

use crate::audit::{self, AuditAction, AuditEvent};
use crate::db::price_repo::{self, JobSource, PriceItem, PriceJobStatus, PriceUploadJob};
use crate::db::Database;
use crate::error::IngestError;

use super::columns::{self, normalize_columns, ColumnAliases};
use super::numeric::parse_decimal;
use super::ocr::{OcrBackend, OcrInput, OcrSettings};
use super::pdf::{self, PdfText};
use super::table::{CanonicalRow, RawTable};
use super::{image, spreadsheet};

pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub const ACCEPTED_EXTENSIONS: [&str; 8] =
    ["xlsx", "xls", "pdf", "jpg", "jpeg", "png", "tiff", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Spreadsheet,
    Pdf,
    Image,
}

impl DocumentKind {
    /// Classifies by extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Result<Self, IngestError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xls" => Ok(DocumentKind::Spreadsheet),
            "pdf" => Ok(DocumentKind::Pdf),
            "jpg" | "jpeg" | "png" | "tiff" | "bmp" => Ok(DocumentKind::Image),
            _ => Err(IngestError::UnsupportedExtension(ext)),
        }
    }
}

/// A file handed in for ingestion.
#[derive(Debug, Clone)]
pub struct PriceUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub supplier: Option<String>,
    pub uploaded_by: Option<String>,
}

impl PriceUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes,
            supplier: None,
            uploaded_by: None,
        }
    }

    pub fn with_supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn by(mut self, user: impl Into<String>) -> Self {
        self.uploaded_by = Some(user.into());
        self
    }
}

/// Cooperative cancellation, checked once extraction has finished.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Turns uploaded price lists into [`PriceItem`] rows under a job.
pub struct PriceIngestPipeline {
    db: Database,
    aliases: ColumnAliases,
    ocr: Arc<dyn OcrBackend>,
    settings: OcrSettings,
    max_upload_bytes: usize,
}

impl PriceIngestPipeline {
    pub fn new(
        db: Database,
        aliases: ColumnAliases,
        ocr: Arc<dyn OcrBackend>,
        settings: OcrSettings,
    ) -> Self {
        Self {
            db,
            aliases,
            ocr,
            settings,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Checks size and type, then stores the file as a PENDING job.
    pub fn create_job(&self, upload: PriceUpload, source: JobSource) -> Result<String, IngestError> {
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(IngestError::TooLarge {
                size: upload.bytes.len(),
                limit: self.max_upload_bytes,
            });
        }
        DocumentKind::from_filename(&upload.filename)?;

        let content_type = upload.content_type.or_else(|| {
            mime_guess::from_path(&upload.filename)
                .first()
                .map(|m| m.to_string())
        });
        let now = Utc::now();
        let job = PriceUploadJob {
            id: uuid::Uuid::new_v4().to_string(),
            status: PriceJobStatus::Pending,
            source,
            supplier: upload.supplier,
            original_filename: upload.filename,
            content_type,
            file_bytes: upload.bytes,
            rows_extracted: 0,
            error_message: None,
            uploaded_by: upload.uploaded_by,
            created_at: now,
            updated_at: now,
        };
        self.db.with_conn(|conn| price_repo::insert_job(conn, &job))?;

        info!(job_id = %job.id, source = job.source.as_str(), "Created price upload job");
        Ok(job.id)
    }

    /// Runs a job to COMPLETED, returning the number of rows stored. On any
    /// failure the job ends FAILED with the error message and no items.
    ///
    /// Reprocessing replaces the items of earlier runs.
    pub fn process_job(&self, job_id: &str, cancel: &CancelFlag) -> Result<u32, IngestError> {
        let _span = info_span!("price_ingest", job_id = %job_id).entered();

        let job = self
            .db
            .with_conn(|conn| price_repo::find_job(conn, job_id))?
            .ok_or_else(|| IngestError::JobNotFound(job_id.to_string()))?;

        self.db.with_conn(|conn| {
            price_repo::update_job_status(
                conn,
                job_id,
                PriceJobStatus::Processing,
                0,
                None,
                Utc::now(),
            )
        })?;

        let result = self
            .extract_items(&job, cancel)
            .and_then(|items| self.complete_job(&job, &items));

        if let Err(ref e) = result {
            warn!("Price list '{}' failed: {}", job.original_filename, e);
            self.fail_job(&job, e);
        }
        result
    }

    /// Convenience: create then process in one call.
    pub fn ingest(
        &self,
        upload: PriceUpload,
        cancel: &CancelFlag,
    ) -> Result<(String, u32), IngestError> {
        let job_id = self.create_job(upload, JobSource::Upload)?;
        let rows = self.process_job(&job_id, cancel)?;
        Ok((job_id, rows))
    }

    fn extract_items(
        &self,
        job: &PriceUploadJob,
        cancel: &CancelFlag,
    ) -> Result<Vec<PriceItem>, IngestError> {
        let kind = DocumentKind::from_filename(&job.original_filename)?;
        let table = {
            let _step = info_span!("extract", kind = ?kind).entered();
            self.extract_table(kind, &job.file_bytes)?
        };

        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        if table.is_empty() {
            return Err(IngestError::EmptyTable);
        }

        let mapping = normalize_columns(&table.headers, &self.aliases);
        if !mapping.contains_canonical(columns::URUN_ADI) {
            return Err(IngestError::MissingColumn(columns::URUN_ADI.to_string()));
        }
        debug!("Mapped {} of {} column(s)", mapping.len(), table.headers.len());

        let items: Vec<PriceItem> = table
            .canonical_rows(&mapping)
            .iter()
            .filter_map(|row| price_item(row, job.supplier.as_deref()))
            .collect();
        debug!(
            "Kept {} of {} row(s) with a product name",
            items.len(),
            table.rows.len()
        );
        Ok(items)
    }

    fn extract_table(&self, kind: DocumentKind, bytes: &[u8]) -> Result<RawTable, IngestError> {
        match kind {
            DocumentKind::Spreadsheet => spreadsheet::read_table(bytes),
            DocumentKind::Pdf => match pdf::extract_text(bytes) {
                PdfText::Embedded(text) => Ok(RawTable::from_text(&text)),
                PdfText::NeedsOcr(reason) => {
                    let _ocr = info_span!("ocr_fallback", reason = reason.as_str()).entered();
                    let text = self
                        .ocr
                        .recognize(&self.settings.request(bytes, OcrInput::Pdf))?;
                    Ok(RawTable::from_text(&text))
                }
            },
            DocumentKind::Image => {
                let png = image::preprocess(bytes, self.settings.dpi())?;
                let _ocr = info_span!("ocr", backend = self.ocr.name()).entered();
                let text = self
                    .ocr
                    .recognize(&self.settings.request(&png, OcrInput::Image))?;
                Ok(RawTable::from_text(&text))
            }
        }
    }

    fn complete_job(&self, job: &PriceUploadJob, items: &[PriceItem]) -> Result<u32, IngestError> {
        let rows = items.len() as u32;
        self.db.with_tx(|tx| {
            let replaced = price_repo::delete_items_for_job(tx, &job.id)?;
            if replaced > 0 {
                debug!("Replacing {} item(s) from an earlier run", replaced);
            }
            price_repo::insert_items(tx, &job.id, items)?;
            price_repo::update_job_status(
                tx,
                &job.id,
                PriceJobStatus::Completed,
                rows,
                None,
                Utc::now(),
            )?;
            audit::record(
                tx,
                &AuditEvent::new(
                    AuditAction::PriceListImported,
                    format!("{}: {} row(s)", job.original_filename, rows),
                )
                .by(job.uploaded_by.as_deref()),
            )?;
            Ok::<_, IngestError>(())
        })?;

        info!("Imported {} price row(s) from '{}'", rows, job.original_filename);
        Ok(rows)
    }

    /// Marks a job that never reached processing as FAILED.
    pub(crate) fn abandon_job(&self, job_id: &str, error: &IngestError) {
        match self.db.with_conn(|conn| price_repo::find_job(conn, job_id)) {
            Ok(Some(job)) => self.fail_job(&job, error),
            Ok(None) => warn!("Price job {} vanished before it could be failed", job_id),
            Err(e) => warn!("Failed to load price job {}: {}", job_id, e),
        }
    }

    fn fail_job(&self, job: &PriceUploadJob, error: &IngestError) {
        let message = error.to_string();
        let result = self.db.with_tx(|tx| {
            price_repo::delete_items_for_job(tx, &job.id)?;
            price_repo::update_job_status(
                tx,
                &job.id,
                PriceJobStatus::Failed,
                0,
                Some(&message),
                Utc::now(),
            )?;
            audit::record(
                tx,
                &AuditEvent::new(
                    AuditAction::PriceListFailed,
                    format!("{}: {}", job.original_filename, message),
                )
                .by(job.uploaded_by.as_deref()),
            )?;
            Ok::<_, crate::db::DatabaseError>(())
        });
        if let Err(e) = result {
            warn!("Failed to mark price job {} as failed: {}", job.id, e);
        }
    }
}

/// Builds an item from a renamed row; `None` when the product name is blank.
fn price_item(row: &CanonicalRow, supplier: Option<&str>) -> Option<PriceItem> {
    let text = |key: &str| -> Option<String> {
        row.get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let number = |key: &str| row.get(key).and_then(|v| parse_decimal(v));

    let mut item = PriceItem::named(text(columns::URUN_ADI)?);
    item.product_code = text(columns::URUN_KODU);
    if let Some(unit) = text(columns::BIRIM) {
        item.unit = unit;
    }
    item.list_price = number(columns::LISTE_FIYATI);
    item.discount_rate = number(columns::ISKONTO_ORANI);
    item.net_price = number(columns::NET_FIYAT);
    if let Some(vat) = number(columns::KDV_ORANI) {
        item.vat_rate = vat;
    }
    item.vat_inclusive_price = number(columns::KDV_DAHIL_FIYAT);
    if let Some(currency) = text(columns::PARA_BIRIMI) {
        item.currency = normalize_currency(&currency);
    }
    item.category = text(columns::KATEGORI);
    item.brand = text(columns::MARKA);
    item.supplier = supplier.map(str::to_string);
    Some(item)
}

fn normalize_currency(raw: &str) -> String {
    match raw.trim().to_uppercase().as_str() {
        "TL" | "₺" => PriceItem::DEFAULT_CURRENCY.to_string(),
        "$" => "USD".to_string(),
        "€" => "EUR".to_string(),
        other => other.to_string(),
    }
}
