use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::outbox_repo::OutboxItem;
use crate::db::DatabaseError;

/// Accounting system refuses writes.
pub const E_MIKRO_READ_ONLY: &str = "E_MIKRO_READ_ONLY";
pub const E_UNKNOWN_ENTITY_TYPE: &str = "E_UNKNOWN_ENTITY_TYPE";
pub const E_QUOTA_EXCEEDED: &str = "E_QUOTA_EXCEEDED";
/// Remote answered `ok: false` without a code. Retried.
pub const E_REMOTE_REJECTED: &str = "E_REMOTE_REJECTED";

/// Codes that end an item without retrying.
pub fn default_permanent_codes() -> Vec<String> {
    [E_MIKRO_READ_ONLY, E_UNKNOWN_ENTITY_TYPE, E_QUOTA_EXCEEDED]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// What the remote side said about one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    Success,
    Failure { code: String, message: String },
}

impl SyncResult {
    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        SyncResult::Failure {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Errors that never reached a verdict. All of them are retried.
#[derive(Error, Debug)]
pub enum OutboxError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Dispatch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Pushes one outbox item to the external system. Must be idempotent on
/// (entity type, entity id, operation).
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn sync(&self, item: &OutboxItem) -> Result<SyncResult, OutboxError>;
}
