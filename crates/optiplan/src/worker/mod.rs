//! Parallel export of independent orders.

pub mod job;
pub mod pool;

pub use job::{ExportJob, ExportJobResult};
pub use pool::WorkerPool;
