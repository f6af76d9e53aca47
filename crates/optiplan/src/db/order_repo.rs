//! Order repository: the `orders` and `order_parts` tables.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Statement};
use rust_decimal::Decimal;

use super::{parse_optional_timestamp, parse_timestamp, timestamp, DatabaseError};
use crate::order::{Material, Order, OrderPart, OrderStatus, PartGroup};

/// A raw order row, before its parts are attached.
#[derive(Debug, Clone)]
struct OrderRow {
    id: String,
    customer_name: String,
    status: String,
    material_thickness_mm: String,
    material_color: String,
    material_name: String,
    tracking_token: String,
    reminder_count: u32,
    last_reminder_sent_at: Option<String>,
    created_at: String,
}

impl OrderRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            customer_name: row.get("customer_name")?,
            status: row.get("status")?,
            material_thickness_mm: row.get("material_thickness_mm")?,
            material_color: row.get("material_color")?,
            material_name: row.get("material_name")?,
            tracking_token: row.get("tracking_token")?,
            reminder_count: row.get("reminder_count")?,
            last_reminder_sent_at: row.get("last_reminder_sent_at")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_order(self, parts: Vec<OrderPart>) -> Result<Order, DatabaseError> {
        Ok(Order {
            status: OrderStatus::from_str(&self.status)
                .map_err(|e| DatabaseError::decode("status", e))?,
            material: Material::new(
                decode_decimal("material_thickness_mm", &self.material_thickness_mm)?,
                self.material_color,
                self.material_name,
            ),
            created_at: parse_timestamp("created_at", &self.created_at)?,
            last_reminder_sent_at: parse_optional_timestamp(
                "last_reminder_sent_at",
                self.last_reminder_sent_at,
            )?,
            id: self.id,
            customer_name: self.customer_name,
            tracking_token: self.tracking_token,
            reminder_count: self.reminder_count,
            parts,
        })
    }
}

#[derive(Debug, Clone)]
struct PartRow {
    id: i64,
    part_group: String,
    length_mm: u32,
    width_mm: u32,
    quantity: u32,
    thickness_mm: Option<String>,
    grain: Option<String>,
    grain_opti: Option<u8>,
    edge_banding_u1: Option<String>,
    edge_banding_u2: Option<String>,
    edge_banding_k1: Option<String>,
    edge_banding_k2: Option<String>,
    drill_code_1: Option<String>,
    drill_code_2: Option<String>,
    description: Option<String>,
}

impl PartRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            part_group: row.get("part_group")?,
            length_mm: row.get("length_mm")?,
            width_mm: row.get("width_mm")?,
            quantity: row.get("quantity")?,
            thickness_mm: row.get("thickness_mm")?,
            grain: row.get("grain")?,
            grain_opti: row.get("grain_opti")?,
            edge_banding_u1: row.get("edge_banding_u1")?,
            edge_banding_u2: row.get("edge_banding_u2")?,
            edge_banding_k1: row.get("edge_banding_k1")?,
            edge_banding_k2: row.get("edge_banding_k2")?,
            drill_code_1: row.get("drill_code_1")?,
            drill_code_2: row.get("drill_code_2")?,
            description: row.get("description")?,
        })
    }

    fn into_part(self) -> Result<OrderPart, DatabaseError> {
        Ok(OrderPart {
            id: Some(self.id),
            part_group: PartGroup::from_str(&self.part_group)
                .map_err(|e| DatabaseError::decode("part_group", e))?,
            length_mm: self.length_mm,
            width_mm: self.width_mm,
            quantity: self.quantity,
            thickness_mm: self
                .thickness_mm
                .map(|t| decode_decimal("thickness_mm", &t))
                .transpose()?,
            grain: self.grain,
            grain_opti: self.grain_opti,
            edge_banding_u1: self.edge_banding_u1,
            edge_banding_u2: self.edge_banding_u2,
            edge_banding_k1: self.edge_banding_k1,
            edge_banding_k2: self.edge_banding_k2,
            drill_code_1: self.drill_code_1,
            drill_code_2: self.drill_code_2,
            description: self.description,
        })
    }
}

/// An order due for a delivery reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderCandidate {
    pub id: String,
    pub customer_name: String,
    pub tracking_token: String,
    pub reminder_count: u32,
}

fn decode_decimal(column: &str, raw: &str) -> Result<Decimal, DatabaseError> {
    Decimal::from_str(raw).map_err(|e| DatabaseError::decode(column, e))
}

/// Blank strings are stored as NULL so storage constraints see them as unset.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Inserts a new order with its parts.
pub fn insert(conn: &Connection, order: &Order) -> Result<(), DatabaseError> {
    let now = timestamp(Utc::now());
    conn.execute(
        "INSERT INTO orders (id, customer_name, status, material_thickness_mm, material_color,
         material_name, tracking_token, reminder_count, last_reminder_sent_at, created_at,
         updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            order.id,
            order.customer_name,
            order.status.as_str(),
            order.material.thickness_mm.normalize().to_string(),
            order.material.color,
            order.material.name,
            order.tracking_token,
            order.reminder_count,
            order.last_reminder_sent_at.map(timestamp),
            timestamp(order.created_at),
            now,
        ],
    )
    .map_err(DatabaseError::classify)?;
    insert_parts(conn, &order.id, &order.parts)
}

/// Inserts the order or overwrites its body and parts.
///
/// `created_at`, the reminder counters and the status are left untouched on
/// an existing row; status changes go through [`set_status`]. Parts are
/// matched by position so their ids, and the scan history keyed on them,
/// survive a re-export.
pub fn upsert(conn: &Connection, order: &Order) -> Result<(), DatabaseError> {
    let now = timestamp(Utc::now());
    conn.execute(
        "INSERT INTO orders (id, customer_name, status, material_thickness_mm, material_color,
         material_name, tracking_token, reminder_count, last_reminder_sent_at, created_at,
         updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(id) DO UPDATE SET
            customer_name = excluded.customer_name,
            material_thickness_mm = excluded.material_thickness_mm,
            material_color = excluded.material_color,
            material_name = excluded.material_name,
            tracking_token = excluded.tracking_token,
            updated_at = excluded.updated_at",
        params![
            order.id,
            order.customer_name,
            order.status.as_str(),
            order.material.thickness_mm.normalize().to_string(),
            order.material.color,
            order.material.name,
            order.tracking_token,
            order.reminder_count,
            order.last_reminder_sent_at.map(timestamp),
            timestamp(order.created_at),
            now,
        ],
    )
    .map_err(DatabaseError::classify)?;

    let stored: i64 = conn.query_row(
        "SELECT COUNT(*) FROM order_parts WHERE order_id = ?1",
        params![order.id],
        |r| r.get(0),
    )?;

    let mut update = conn.prepare(UPDATE_PART)?;
    let mut insert = conn.prepare(INSERT_PART)?;
    for (position, part) in order.parts.iter().enumerate() {
        let stmt = if (position as i64) < stored {
            &mut update
        } else {
            &mut insert
        };
        write_part(stmt, &order.id, position, part)?;
    }

    conn.execute(
        "DELETE FROM order_parts WHERE order_id = ?1 AND position >= ?2",
        params![order.id, order.parts.len() as i64],
    )?;
    Ok(())
}

const INSERT_PART: &str = "INSERT INTO order_parts (order_id, position, part_group, length_mm,
     width_mm, quantity, thickness_mm, grain, grain_opti, edge_banding_u1, edge_banding_u2,
     edge_banding_k1, edge_banding_k2, drill_code_1, drill_code_2, description)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)";

const UPDATE_PART: &str = "UPDATE order_parts SET part_group = ?3, length_mm = ?4,
     width_mm = ?5, quantity = ?6, thickness_mm = ?7, grain = ?8, grain_opti = ?9,
     edge_banding_u1 = ?10, edge_banding_u2 = ?11, edge_banding_k1 = ?12,
     edge_banding_k2 = ?13, drill_code_1 = ?14, drill_code_2 = ?15, description = ?16
     WHERE order_id = ?1 AND position = ?2";

fn insert_parts(conn: &Connection, order_id: &str, parts: &[OrderPart]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(INSERT_PART)?;
    for (position, part) in parts.iter().enumerate() {
        write_part(&mut stmt, order_id, position, part)?;
    }
    Ok(())
}

/// Runs [`INSERT_PART`] or [`UPDATE_PART`]; both share the parameter layout.
fn write_part(
    stmt: &mut Statement<'_>,
    order_id: &str,
    position: usize,
    part: &OrderPart,
) -> Result<(), DatabaseError> {
    stmt.execute(params![
        order_id,
        position as i64,
        part.part_group.as_str(),
        part.length_mm,
        part.width_mm,
        part.quantity,
        part.thickness_mm.map(|t| t.normalize().to_string()),
        part.grain,
        part.grain_opti,
        non_blank(&part.edge_banding_u1),
        non_blank(&part.edge_banding_u2),
        non_blank(&part.edge_banding_k1),
        non_blank(&part.edge_banding_k2),
        non_blank(&part.drill_code_1),
        non_blank(&part.drill_code_2),
        part.description,
    ])
    .map_err(DatabaseError::classify)?;
    Ok(())
}

fn load_parts(conn: &Connection, order_id: &str) -> Result<Vec<OrderPart>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM order_parts WHERE order_id = ?1 ORDER BY position")?;
    let rows = stmt
        .query_map(params![order_id], PartRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(PartRow::into_part).collect()
}

fn find_where(conn: &Connection, column: &str, value: &str) -> Result<Option<Order>, DatabaseError> {
    let sql = format!("SELECT * FROM orders WHERE {} = ?1", column);
    let row = conn
        .query_row(&sql, params![value], OrderRow::from_row)
        .optional()?;
    match row {
        Some(row) => {
            let parts = load_parts(conn, &row.id)?;
            row.into_order(parts).map(Some)
        }
        None => Ok(None),
    }
}

/// Finds an order with its parts by id.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<Order>, DatabaseError> {
    find_where(conn, "id", id)
}

/// Finds an order with its parts by its public tracking token.
pub fn find_by_tracking_token(
    conn: &Connection,
    token: &str,
) -> Result<Option<Order>, DatabaseError> {
    find_where(conn, "tracking_token", token)
}

/// Current status of an order, if it exists.
pub fn status_of(conn: &Connection, id: &str) -> Result<Option<OrderStatus>, DatabaseError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT status FROM orders WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    raw.map(|s| OrderStatus::from_str(&s).map_err(|e| DatabaseError::decode("status", e)))
        .transpose()
}

/// Overwrites the status. Returns false when no such order exists.
pub fn set_status(
    conn: &Connection,
    id: &str,
    status: OrderStatus,
    at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status.as_str(), timestamp(at)],
    )?;
    Ok(changed > 0)
}

/// DELIVERY_PENDING orders below `max_reminders` whose last reminder is
/// absent or older than `sent_before`.
pub fn reminder_candidates(
    conn: &Connection,
    max_reminders: u32,
    sent_before: DateTime<Utc>,
) -> Result<Vec<ReminderCandidate>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, customer_name, tracking_token, reminder_count FROM orders
         WHERE status = ?1
           AND reminder_count < ?2
           AND (last_reminder_sent_at IS NULL OR last_reminder_sent_at < ?3)
         ORDER BY created_at, id",
    )?;
    let rows = stmt
        .query_map(
            params![
                OrderStatus::DeliveryPending.as_str(),
                max_reminders,
                timestamp(sent_before)
            ],
            |row| {
                Ok(ReminderCandidate {
                    id: row.get(0)?,
                    customer_name: row.get(1)?,
                    tracking_token: row.get(2)?,
                    reminder_count: row.get(3)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Bumps the reminder counter and stamps the send time.
pub fn record_reminder(
    conn: &Connection,
    id: &str,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE orders SET reminder_count = reminder_count + 1, last_reminder_sent_at = ?2,
         updated_at = ?2 WHERE id = ?1",
        params![id, timestamp(at)],
    )?;
    Ok(())
}
