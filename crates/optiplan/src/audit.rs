//! Append-only audit event sink.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{audit_repo, timestamp, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    OrderExported,
    ExportRejected,
    OrderStatusChanged,
    PriceListImported,
    PriceListFailed,
    PartScanned,
    ReminderSent,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::OrderExported => "ORDER_EXPORTED",
            AuditAction::ExportRejected => "EXPORT_REJECTED",
            AuditAction::OrderStatusChanged => "ORDER_STATUS_CHANGED",
            AuditAction::PriceListImported => "PRICE_LIST_IMPORTED",
            AuditAction::PriceListFailed => "PRICE_LIST_FAILED",
            AuditAction::PartScanned => "PART_SCANNED",
            AuditAction::ReminderSent => "REMINDER_SENT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub actor: Option<String>,
    pub action: AuditAction,
    pub order_id: Option<String>,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, detail: impl Into<String>) -> Self {
        Self {
            actor: None,
            action,
            order_id: None,
            detail: detail.into(),
            at: Utc::now(),
        }
    }

    pub fn by(mut self, actor: Option<&str>) -> Self {
        self.actor = actor.map(str::to_string);
        self
    }

    pub fn for_order(mut self, order_id: &str) -> Self {
        self.order_id = Some(order_id.to_string());
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// Appends `event`. Runs on whatever connection or transaction the caller
/// holds, so the row commits or rolls back with the mutation it describes.
pub fn record(conn: &Connection, event: &AuditEvent) -> Result<i64, DatabaseError> {
    tracing::debug!(action = %event.action, order_id = ?event.order_id, "audit");
    audit_repo::insert(
        conn,
        event.actor.as_deref(),
        event.action.as_str(),
        event.order_id.as_deref(),
        &event.detail,
        &timestamp(event.at),
    )
}
