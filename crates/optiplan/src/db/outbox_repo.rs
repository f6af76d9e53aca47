//! Integration outbox repository: the `integration_outbox` table.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{parse_optional_timestamp, parse_timestamp, timestamp, DatabaseError};

/// Default retry budget for a new item.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }

    fn parse(raw: &str) -> Result<Self, DatabaseError> {
        match raw {
            "CREATE" => Ok(Operation::Create),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            other => Err(DatabaseError::decode(
                "operation",
                format!("unknown operation '{}'", other),
            )),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutboxStatus {
    Queued,
    Success,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OutboxStatus::Queued => "QUEUED",
            OutboxStatus::Success => "SUCCESS",
            OutboxStatus::Failed => "FAILED",
        }
    }

    fn parse(raw: &str) -> Result<Self, DatabaseError> {
        match raw {
            "QUEUED" => Ok(OutboxStatus::Queued),
            "SUCCESS" => Ok(OutboxStatus::Success),
            "FAILED" => Ok(OutboxStatus::Failed),
            other => Err(DatabaseError::decode(
                "status",
                format!("unknown outbox status '{}'", other),
            )),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, OutboxStatus::Queued)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxItem {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub operation: Operation,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct OutboxRow {
    id: i64,
    entity_type: String,
    entity_id: String,
    operation: String,
    payload: String,
    status: String,
    retry_count: u32,
    max_retries: u32,
    last_error: Option<String>,
    created_at: String,
    processed_at: Option<String>,
}

impl OutboxRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            entity_type: row.get("entity_type")?,
            entity_id: row.get("entity_id")?,
            operation: row.get("operation")?,
            payload: row.get("payload")?,
            status: row.get("status")?,
            retry_count: row.get("retry_count")?,
            max_retries: row.get("max_retries")?,
            last_error: row.get("last_error")?,
            created_at: row.get("created_at")?,
            processed_at: row.get("processed_at")?,
        })
    }

    fn into_item(self) -> Result<OutboxItem, DatabaseError> {
        Ok(OutboxItem {
            operation: Operation::parse(&self.operation)?,
            payload: serde_json::from_str(&self.payload)
                .map_err(|e| DatabaseError::decode("payload", e))?,
            status: OutboxStatus::parse(&self.status)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            processed_at: parse_optional_timestamp("processed_at", self.processed_at)?,
            id: self.id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            last_error: self.last_error,
        })
    }
}

/// Queues an entity mutation. Call inside the transaction that performs
/// the mutation. Returns the new item id.
pub fn enqueue(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    operation: Operation,
    payload: &serde_json::Value,
    max_retries: u32,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO integration_outbox (entity_type, entity_id, operation, payload, status,
         retry_count, max_retries, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
        params![
            entity_type,
            entity_id,
            operation.as_str(),
            payload.to_string(),
            OutboxStatus::Queued.as_str(),
            max_retries,
            timestamp(Utc::now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<OutboxItem>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM integration_outbox WHERE id = ?1",
            params![id],
            OutboxRow::from_row,
        )
        .optional()?;
    row.map(OutboxRow::into_item).transpose()
}

/// Ids of QUEUED items in insertion order.
pub fn pending_ids(conn: &Connection, limit: usize) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM integration_outbox WHERE status = ?1 ORDER BY id LIMIT ?2",
    )?;
    let ids = stmt
        .query_map(
            params![OutboxStatus::Queued.as_str(), limit as i64],
            |r| r.get(0),
        )?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Items for one entity, oldest first.
pub fn for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<OutboxItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM integration_outbox WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![entity_type, entity_id], OutboxRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(OutboxRow::into_item).collect()
}

pub fn mark_success(conn: &Connection, id: i64, at: DateTime<Utc>) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE integration_outbox SET status = ?2, last_error = NULL, processed_at = ?3
         WHERE id = ?1",
        params![id, OutboxStatus::Success.as_str(), timestamp(at)],
    )?;
    Ok(())
}

/// Terminal failure without touching the retry counter.
pub fn mark_failed(
    conn: &Connection,
    id: i64,
    error: &str,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE integration_outbox SET status = ?2, last_error = ?3, processed_at = ?4
         WHERE id = ?1",
        params![id, OutboxStatus::Failed.as_str(), error, timestamp(at)],
    )?;
    Ok(())
}

/// Records a transient failure: bumps `retry_count` and sets the status
/// the caller decided on.
pub fn record_retry(
    conn: &Connection,
    id: i64,
    retry_count: u32,
    status: OutboxStatus,
    error: &str,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let processed_at = status.is_terminal().then(|| timestamp(at));
    conn.execute(
        "UPDATE integration_outbox SET status = ?2, retry_count = ?3, last_error = ?4,
         processed_at = ?5 WHERE id = ?1",
        params![id, status.as_str(), retry_count, error, processed_at],
    )?;
    Ok(())
}
