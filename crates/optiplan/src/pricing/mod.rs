//! Supplier price-list ingestion.
//!
//! Spreadsheets are read directly. PDFs use their text layer when it is
//! usable and go to OCR otherwise; images are cleaned up and always go to
//! OCR. Whatever the source, the result is a [`RawTable`] whose columns are
//! renamed through the alias table before rows become price items.

pub mod columns;
pub mod device;
pub mod image;
pub mod ingest;
pub mod numeric;
pub mod ocr;
pub mod pdf;
pub mod spreadsheet;
pub mod table;

pub use columns::{normalize_columns, ColumnAlias, ColumnAliases, ColumnMapping};
pub use device::{DeviceIntake, IngestTask, DEVICE_MAX_BYTES};
pub use ingest::{
    CancelFlag, DocumentKind, PriceIngestPipeline, PriceUpload, ACCEPTED_EXTENSIONS,
    MAX_UPLOAD_BYTES,
};
pub use numeric::parse_decimal;
pub use ocr::{default_backend, DisabledOcr, OcrBackend, OcrInput, OcrRequest, OcrSettings};
pub use table::RawTable;
