//! Station scan log: the `status_logs` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_timestamp, timestamp, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct StatusLog {
    pub id: i64,
    pub order_id: Option<String>,
    pub part_id: i64,
    pub station_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Timestamp of the newest scan of a part at any station.
pub fn latest_for_part(
    conn: &Connection,
    part_id: i64,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT MAX(created_at) FROM status_logs WHERE part_id = ?1",
            params![part_id],
            |r| r.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten();
    raw.map(|r| parse_timestamp("created_at", &r)).transpose()
}

/// Appends a scan row and returns its id.
pub fn insert(
    conn: &Connection,
    order_id: Option<&str>,
    part_id: i64,
    station_id: i64,
    status: &str,
    at: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO status_logs (order_id, part_id, station_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![order_id, part_id, station_id, status, timestamp(at)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All scans of a part, oldest first.
pub fn for_part(conn: &Connection, part_id: i64) -> Result<Vec<StatusLog>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, part_id, station_id, status, created_at FROM status_logs
         WHERE part_id = ?1 ORDER BY created_at, id",
    )?;
    let rows = stmt
        .query_map(params![part_id], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, Option<String>>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, i64>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, order_id, part_id, station_id, status, created_at)| {
            Ok(StatusLog {
                id,
                order_id,
                part_id,
                station_id,
                status,
                created_at: parse_timestamp("created_at", &created_at)?,
            })
        })
        .collect()
}
