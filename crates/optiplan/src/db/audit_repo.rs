//! Audit log repository: the append-only `audit_logs` table.

use rusqlite::{params, Connection, Row};

use super::DatabaseError;

/// A raw audit row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogRow {
    pub id: i64,
    pub actor: Option<String>,
    pub action: String,
    pub order_id: Option<String>,
    pub detail: String,
    pub created_at: String,
}

impl AuditLogRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            actor: row.get("actor")?,
            action: row.get("action")?,
            order_id: row.get("order_id")?,
            detail: row.get("detail")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Appends an audit row and returns its id.
pub fn insert(
    conn: &Connection,
    actor: Option<&str>,
    action: &str,
    order_id: Option<&str>,
    detail: &str,
    created_at: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO audit_logs (actor, action, order_id, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![actor, action, order_id, detail, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Audit rows for one order, oldest first.
pub fn for_order(conn: &Connection, order_id: &str) -> Result<Vec<AuditLogRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM audit_logs WHERE order_id = ?1 ORDER BY id")?;
    let rows = stmt
        .query_map(params![order_id], AuditLogRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Most recent rows with the given action, newest first.
pub fn by_action(
    conn: &Connection,
    action: &str,
    limit: usize,
) -> Result<Vec<AuditLogRow>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM audit_logs WHERE action = ?1 ORDER BY id DESC LIMIT ?2")?;
    let rows = stmt
        .query_map(params![action, limit as i64], AuditLogRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
