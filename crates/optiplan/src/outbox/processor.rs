use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::db::outbox_repo::{self, OutboxItem, OutboxStatus};
use crate::db::Database;

use super::handler::{
    default_permanent_codes, OutboxError, SyncHandler, SyncResult, E_UNKNOWN_ENTITY_TYPE,
};

pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub ok: bool,
    /// The item stays QUEUED and will be picked up again.
    pub retry: bool,
}

impl ProcessOutcome {
    const SUCCESS: Self = Self {
        ok: true,
        retry: false,
    };
    const FAILED: Self = Self {
        ok: false,
        retry: false,
    };
    const RETRY: Self = Self {
        ok: false,
        retry: true,
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub retrying: usize,
    /// Held back behind an earlier item of the same entity.
    pub deferred: usize,
}

/// Drains the integration outbox through per-entity-type handlers.
///
/// No database lock is held while a handler runs: each item is read,
/// dispatched, then its verdict written in a separate step.
pub struct OutboxProcessor {
    db: Database,
    handlers: HashMap<String, Arc<dyn SyncHandler>>,
    permanent_codes: HashSet<String>,
    dispatch_timeout: Duration,
}

impl OutboxProcessor {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            handlers: HashMap::new(),
            permanent_codes: default_permanent_codes().into_iter().collect(),
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    pub fn register(mut self, entity_type: &str, handler: Arc<dyn SyncHandler>) -> Self {
        self.handlers.insert(entity_type.to_string(), handler);
        self
    }

    pub fn with_permanent_codes(mut self, codes: impl IntoIterator<Item = String>) -> Self {
        self.permanent_codes = codes.into_iter().collect();
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    /// Dispatches one item and records the verdict. Items already in a
    /// terminal state are reported as they are without dispatching again.
    pub async fn process_item(&self, id: i64) -> Result<ProcessOutcome, OutboxError> {
        let Some(item) = self.db.with_conn(|conn| outbox_repo::find_by_id(conn, id))? else {
            return Ok(ProcessOutcome::FAILED);
        };
        match item.status {
            OutboxStatus::Success => return Ok(ProcessOutcome::SUCCESS),
            OutboxStatus::Failed => return Ok(ProcessOutcome::FAILED),
            OutboxStatus::Queued => {}
        }

        let span = info_span!("outbox.dispatch",
            id = item.id,
            entity_type = %item.entity_type,
            operation = %item.operation,
        );
        let verdict = self.dispatch(&item).instrument(span).await;
        self.record(&item, verdict)
    }

    /// Processes up to `limit` QUEUED items in id order. Once an item of an
    /// entity is left for retry, later items of that entity wait for the
    /// next batch.
    pub async fn process_pending(&self, limit: usize) -> Result<BatchSummary, OutboxError> {
        let ids = self.db.with_conn(|conn| outbox_repo::pending_ids(conn, limit))?;
        let mut summary = BatchSummary::default();
        let mut blocked: HashSet<(String, String)> = HashSet::new();

        for id in ids {
            let Some(item) = self.db.with_conn(|conn| outbox_repo::find_by_id(conn, id))? else {
                continue;
            };
            let key = (item.entity_type.clone(), item.entity_id.clone());
            if blocked.contains(&key) {
                summary.deferred += 1;
                continue;
            }

            let outcome = self.process_item(id).await?;
            if outcome.ok {
                summary.succeeded += 1;
            } else if outcome.retry {
                summary.retrying += 1;
                blocked.insert(key);
            } else {
                summary.failed += 1;
            }
        }

        if summary != BatchSummary::default() {
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                retrying = summary.retrying,
                deferred = summary.deferred,
                "Outbox batch processed"
            );
        }
        Ok(summary)
    }

    async fn dispatch(&self, item: &OutboxItem) -> Result<SyncResult, OutboxError> {
        let Some(handler) = self.handlers.get(&item.entity_type) else {
            return Ok(SyncResult::failure(
                E_UNKNOWN_ENTITY_TYPE,
                format!("no handler for entity type '{}'", item.entity_type),
            ));
        };
        match tokio::time::timeout(self.dispatch_timeout, handler.sync(item)).await {
            Ok(result) => result,
            Err(_) => Err(OutboxError::Timeout(self.dispatch_timeout)),
        }
    }

    fn record(
        &self,
        item: &OutboxItem,
        verdict: Result<SyncResult, OutboxError>,
    ) -> Result<ProcessOutcome, OutboxError> {
        let now = Utc::now();
        let error = match verdict {
            Ok(SyncResult::Success) => {
                self.db
                    .with_conn(|conn| outbox_repo::mark_success(conn, item.id, now))?;
                debug!("Outbox item {} delivered", item.id);
                return Ok(ProcessOutcome::SUCCESS);
            }
            Ok(SyncResult::Failure { code, message }) if self.permanent_codes.contains(&code) => {
                let error = format!("{}: {}", code, message);
                warn!("Outbox item {} failed permanently: {}", item.id, error);
                self.db
                    .with_conn(|conn| outbox_repo::mark_failed(conn, item.id, &error, now))?;
                return Ok(ProcessOutcome::FAILED);
            }
            Ok(SyncResult::Failure { code, message }) => format!("{}: {}", code, message),
            Err(e) => e.to_string(),
        };

        let retry_count = item.retry_count + 1;
        let status = if retry_count >= item.max_retries {
            OutboxStatus::Failed
        } else {
            OutboxStatus::Queued
        };
        warn!(
            "Outbox item {} attempt {}/{} failed: {}",
            item.id, retry_count, item.max_retries, error
        );
        self.db.with_conn(|conn| {
            outbox_repo::record_retry(conn, item.id, retry_count, status, &error, now)
        })?;

        Ok(if status == OutboxStatus::Queued {
            ProcessOutcome::RETRY
        } else {
            ProcessOutcome::FAILED
        })
    }
}
