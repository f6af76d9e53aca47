//! Delivery reminders for orders waiting on pickup.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::audit::{self, AuditAction, AuditEvent};
use crate::db::order_repo::{self, ReminderCandidate};
use crate::db::{Database, DatabaseError};
use crate::sanitize::redact_token;

pub const DEFAULT_MAX_REMINDERS: u32 = 5;
pub const DEFAULT_MIN_GAP_HOURS: i64 = 48;

#[derive(Error, Debug)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers one reminder to a customer. Failures are reported back but do
/// not stop the order's reminder state from advancing.
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn notify(&self, reminder: &ReminderCandidate) -> Result<(), NotifyError>;
}

/// Writes reminders to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl ReminderNotifier for LogNotifier {
    async fn notify(&self, reminder: &ReminderCandidate) -> Result<(), NotifyError> {
        info!(
            order_id = %reminder.id,
            token = %redact_token(&reminder.tracking_token),
            "Delivery reminder #{} for {}",
            reminder.reminder_count + 1,
            reminder.customer_name
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub max_reminders: u32,
    pub min_gap: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            max_reminders: DEFAULT_MAX_REMINDERS,
            min_gap: Duration::hours(DEFAULT_MIN_GAP_HOURS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReminderSummary {
    pub sent: usize,
    pub failed: usize,
}

pub struct ReminderJob {
    db: Database,
    notifier: Arc<dyn ReminderNotifier>,
    policy: ReminderPolicy,
}

impl ReminderJob {
    pub fn new(db: Database, notifier: Arc<dyn ReminderNotifier>) -> Self {
        Self {
            db,
            notifier,
            policy: ReminderPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReminderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// One pass over DELIVERY_PENDING orders. Each due order is notified,
    /// then its counter and timestamp are committed whatever the outcome.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ReminderSummary, DatabaseError> {
        let sent_before = now - self.policy.min_gap;
        let candidates = self.db.with_conn(|conn| {
            order_repo::reminder_candidates(conn, self.policy.max_reminders, sent_before)
        })?;

        let mut summary = ReminderSummary::default();
        for candidate in candidates {
            let outcome = self.notifier.notify(&candidate).await;
            let detail = match &outcome {
                Ok(()) => {
                    summary.sent += 1;
                    format!("reminder #{}", candidate.reminder_count + 1)
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!("Reminder for order {} failed: {}", candidate.id, e);
                    format!("reminder #{} ({})", candidate.reminder_count + 1, e)
                }
            };

            self.db.with_tx(|tx| {
                order_repo::record_reminder(tx, &candidate.id, now)?;
                audit::record(
                    tx,
                    &AuditEvent::new(AuditAction::ReminderSent, detail)
                        .for_order(&candidate.id)
                        .at(now),
                )?;
                Ok::<_, DatabaseError>(())
            })?;
        }

        if summary != ReminderSummary::default() {
            info!(sent = summary.sent, failed = summary.failed, "Reminder pass finished");
        }
        Ok(summary)
    }
}
