use std::path::PathBuf;
use thiserror::Error;

use crate::compliance::Finding;

#[derive(Error, Debug)]
pub enum OptiplanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Price ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Outbox error: {0}")]
    Outbox(#[from] crate::outbox::OutboxError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Scan rejected: {0}")]
    Scan(#[from] ScanError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid column alias '{canonical}': {reason}")]
    InvalidColumnAlias { canonical: String, reason: String },

    #[error("Failed to read secret '{name}': {reason}")]
    Secret { name: String, reason: String },

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

/// Malformed input: unknown enum value, missing or out-of-range field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Invalid order: {0}")]
    Validation(#[from] ValidationError),

    #[error("Compliance rejected the order with {} error finding(s)", count_errors(.findings))]
    RuleViolation { findings: Vec<Finding> },

    #[error("Template contract mismatch: {}", .mismatches.join("; "))]
    ContractMismatch { mismatches: Vec<String> },

    #[error("Failed to build workbook: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("Failed to read workbook: {0}")]
    WorkbookRead(String),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

fn count_errors(findings: &[Finding]) -> usize {
    findings.iter().filter(|f| f.is_error()).count()
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("File is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("Unsupported file extension: '{0}'")]
    UnsupportedExtension(String),

    #[error("Unsupported content type: '{0}'")]
    UnsupportedContentType(String),

    #[error("Invalid device credentials")]
    Unauthorized,

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to process image: {0}")]
    ImageProcessing(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("OCR backend is not available")]
    OcrUnavailable,

    #[error("No table could be extracted from the document")]
    EmptyTable,

    #[error("Required column '{0}' not found")]
    MissingColumn(String),

    #[error("Price upload job '{0}' not found")]
    JobNotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error("Ingest queue is closed")]
    QueueClosed,

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Job failed: {0}")]
    JobFailed(String),
}

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Invalid tracking token")]
    InvalidToken,

    #[error("Order not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl TrackingError {
    /// Status code the public tracking endpoint answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            TrackingError::InvalidToken => 400,
            TrackingError::NotFound => 404,
            TrackingError::Database(_) => 500,
        }
    }
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("minimum {minutes} minutes between scans of part {part_id}")]
    Cooldown { part_id: i64, minutes: i64 },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, OptiplanError>;
