//! Integration outbox: order mutations queued in the same transaction as the
//! change itself, then pushed to the accounting system out of band.

pub mod handler;
pub mod mikro;
pub mod processor;

pub use handler::{
    default_permanent_codes, OutboxError, SyncHandler, SyncResult, E_MIKRO_READ_ONLY,
    E_QUOTA_EXCEEDED, E_REMOTE_REJECTED, E_UNKNOWN_ENTITY_TYPE,
};
pub use mikro::MikroHttpHandler;
pub use processor::{BatchSummary, OutboxProcessor, ProcessOutcome, DEFAULT_BATCH_SIZE};
