//! Export orchestration: validate → compliance → group → write → persist.

pub mod config;
pub mod context;
pub mod locks;
pub mod runner;

pub use config::PipelineConfig;
pub use context::{ExportContext, ExportOutcome};
pub use locks::OrderLocks;
pub use runner::ExportPipeline;
