//! Export artifact descriptors: the `export_artifacts` table.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{parse_timestamp, timestamp, DatabaseError};
use crate::order::PartGroup;

/// One emitted workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub order_id: String,
    pub part_group: PartGroup,
    pub thickness_mm: Decimal,
    pub color: String,
    pub file_name: String,
    pub file_path: PathBuf,
    pub row_count: u32,
    pub created_at: DateTime<Utc>,
}

pub fn insert(conn: &Connection, artifact: &ExportArtifact) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO export_artifacts (order_id, part_group, thickness_mm, color, file_name,
         file_path, row_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            artifact.order_id,
            artifact.part_group.as_str(),
            artifact.thickness_mm.normalize().to_string(),
            artifact.color,
            artifact.file_name,
            artifact.file_path.to_string_lossy(),
            artifact.row_count,
            timestamp(artifact.created_at),
        ],
    )
    .map_err(DatabaseError::classify)?;
    Ok(conn.last_insert_rowid())
}

/// Artifacts of an order in emission order.
pub fn for_order(conn: &Connection, order_id: &str) -> Result<Vec<ExportArtifact>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT order_id, part_group, thickness_mm, color, file_name, file_path, row_count,
         created_at FROM export_artifacts WHERE order_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![order_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, u32>(6)?,
                r.get::<_, String>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(order_id, group, thickness, color, file_name, file_path, row_count, created_at)| {
                Ok(ExportArtifact {
                    order_id,
                    part_group: PartGroup::from_str(&group)
                        .map_err(|e| DatabaseError::decode("part_group", e))?,
                    thickness_mm: Decimal::from_str(&thickness)
                        .map_err(|e| DatabaseError::decode("thickness_mm", e))?,
                    color,
                    file_name,
                    file_path: PathBuf::from(file_path),
                    row_count,
                    created_at: parse_timestamp("created_at", &created_at)?,
                })
            },
        )
        .collect()
}
