//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_orders_tables",
        sql: include_str!("sql/001_create_orders.sql"),
    },
    Migration {
        version: 2,
        description: "create_price_tables",
        sql: include_str!("sql/002_create_price_jobs.sql"),
    },
    Migration {
        version: 3,
        description: "create_integration_outbox_table",
        sql: include_str!("sql/003_create_integration_outbox.sql"),
    },
    Migration {
        version: 4,
        description: "create_audit_and_status_logs",
        sql: include_str!("sql/004_create_audit_and_status_logs.sql"),
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        conn
    }

    fn insert_order(conn: &Connection) {
        conn.execute(
            "INSERT INTO orders (id, customer_name, material_thickness_mm, material_color,
                material_name, tracking_token, created_at, updated_at)
             VALUES ('o1', 'Ahmet', '18', 'Beyaz', 'MDF', 'abcdefghijkl', 'now', 'now')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = migrated();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = migrated();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_price_jobs_default_to_upload_source() {
        let conn = migrated();
        conn.execute(
            "INSERT INTO price_upload_jobs (id, original_filename, file_bytes, created_at,
                updated_at)
             VALUES ('j1', 'fiyat.xlsx', x'00', 'now', 'now')",
            [],
        )
        .unwrap();
        let source: String = conn
            .query_row("SELECT source FROM price_upload_jobs WHERE id = 'j1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(source, "UPLOAD");
    }

    #[test]
    fn test_arkalik_edge_banding_is_rejected_by_storage() {
        let conn = migrated();
        insert_order(&conn);

        let err = conn
            .execute(
                "INSERT INTO order_parts (order_id, position, part_group, length_mm, width_mm,
                    quantity, edge_banding_u1)
                 VALUES ('o1', 0, 'ARKALIK', 700, 500, 1, 'Red')",
                [],
            )
            .unwrap_err();
        let err = DatabaseError::classify(err);
        assert_eq!(err.constraint(), Some("chk_no_edge_banding_arkalik"));
    }

    #[test]
    fn test_arkalik_drilling_is_rejected_by_storage() {
        let conn = migrated();
        insert_order(&conn);

        let err = conn
            .execute(
                "INSERT INTO order_parts (order_id, position, part_group, length_mm, width_mm,
                    quantity, drill_code_1)
                 VALUES ('o1', 0, 'ARKALIK', 700, 500, 1, 'D8')",
                [],
            )
            .unwrap_err();
        let err = DatabaseError::classify(err);
        assert_eq!(err.constraint(), Some("chk_no_drilling_arkalik"));
    }

    #[test]
    fn test_govde_edge_banding_is_allowed() {
        let conn = migrated();
        insert_order(&conn);
        conn.execute(
            "INSERT INTO order_parts (order_id, position, part_group, length_mm, width_mm,
                quantity, edge_banding_u1, drill_code_1)
             VALUES ('o1', 0, 'GOVDE', 700, 500, 1, 'Red', 'D8')",
            [],
        )
        .unwrap();
    }
}
