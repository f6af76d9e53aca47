//! Core of the OptiPlan360 shop system: order compliance and OptiPlanning
//! export, supplier price-list ingestion, the accounting outbox and the
//! small background jobs around them.

pub mod audit;
pub mod compliance;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod order;
pub mod outbox;
pub mod pipeline;
pub mod pricing;
pub mod reminder;
pub mod sanitize;
pub mod scan;
pub mod scheduler;
pub mod storage;
pub mod telemetry;
pub mod tracking;
pub mod worker;

pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, ExportError, IngestError, OptiplanError, Result, ScanError, StorageError,
    TrackingError, ValidationError, WorkerError,
};
pub use order::{Material, Order, OrderPart, OrderStatus, PartGroup};
pub use outbox::{OutboxError, OutboxProcessor};
pub use pipeline::{ExportPipeline, PipelineConfig};
pub use pricing::{DeviceIntake, PriceIngestPipeline};
pub use reminder::ReminderJob;
pub use scheduler::Scheduler;
pub use worker::WorkerPool;
