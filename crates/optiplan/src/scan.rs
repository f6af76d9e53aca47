//! Station scans and the per-part cooldown.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{self, AuditAction, AuditEvent};
use crate::db::{status_log_repo, Database};
use crate::error::ScanError;

pub const DEFAULT_COOLDOWN_MINUTES: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub order_id: Option<String>,
    pub part_id: i64,
    pub station_id: i64,
    pub status: String,
}

impl ScanRequest {
    pub fn new(part_id: i64, station_id: i64, status: impl Into<String>) -> Self {
        Self {
            order_id: None,
            part_id,
            station_id,
            status: status.into(),
        }
    }

    pub fn for_order(mut self, order_id: &str) -> Self {
        self.order_id = Some(order_id.to_string());
        self
    }
}

/// Accepts a scan with the default 30 minute cooldown.
pub fn record_scan(
    db: &Database,
    request: &ScanRequest,
    now: DateTime<Utc>,
) -> Result<i64, ScanError> {
    record_scan_with_cooldown(db, request, now, Duration::minutes(DEFAULT_COOLDOWN_MINUTES))
}

/// Rejects the scan when the part was scanned at any station less than
/// `cooldown` before `now`; otherwise appends it. Returns the new log id.
pub fn record_scan_with_cooldown(
    db: &Database,
    request: &ScanRequest,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Result<i64, ScanError> {
    db.with_tx(|tx| {
        if let Some(last) = status_log_repo::latest_for_part(tx, request.part_id)? {
            if now - last < cooldown {
                log::debug!(
                    "Scan of part {} rejected, last scan at {}",
                    request.part_id,
                    last
                );
                return Err(ScanError::Cooldown {
                    part_id: request.part_id,
                    minutes: cooldown.num_minutes(),
                });
            }
        }

        let id = status_log_repo::insert(
            tx,
            request.order_id.as_deref(),
            request.part_id,
            request.station_id,
            &request.status,
            now,
        )?;

        let mut event = AuditEvent::new(
            AuditAction::PartScanned,
            format!(
                "part {} at station {}: {}",
                request.part_id, request.station_id, request.status
            ),
        )
        .at(now);
        if let Some(order_id) = &request.order_id {
            event = event.for_order(order_id);
        }
        audit::record(tx, &event)?;

        Ok(id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::audit_repo;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 3, 12, 0, 0).unwrap()
    }

    fn scan(part_id: i64, station_id: i64) -> ScanRequest {
        ScanRequest::new(part_id, station_id, "CUT").for_order("o-1")
    }

    #[test]
    fn test_first_scan_is_accepted() {
        let db = Database::open_in_memory().unwrap();
        let id = record_scan(&db, &scan(10, 1), now()).unwrap();
        assert!(id > 0);

        let logs = db
            .with_conn(|conn| status_log_repo::for_part(conn, 10))
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].order_id.as_deref(), Some("o-1"));
    }

    #[test]
    fn test_recent_scan_blocks_any_station() {
        let db = Database::open_in_memory().unwrap();
        record_scan(&db, &scan(10, 1), now() - Duration::minutes(10)).unwrap();

        let err = record_scan(&db, &scan(10, 2), now()).unwrap_err();
        assert!(matches!(err, ScanError::Cooldown { part_id: 10, minutes: 30 }));
        assert!(err.to_string().contains("minimum 30 minutes"));

        let logs = db
            .with_conn(|conn| status_log_repo::for_part(conn, 10))
            .unwrap();
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn test_old_scan_allows_new_one() {
        let db = Database::open_in_memory().unwrap();
        record_scan(&db, &scan(11, 1), now() - Duration::minutes(31)).unwrap();
        assert!(record_scan(&db, &scan(11, 1), now()).is_ok());
    }

    #[test]
    fn test_exact_cooldown_is_accepted() {
        let db = Database::open_in_memory().unwrap();
        record_scan(&db, &scan(12, 1), now() - Duration::minutes(30)).unwrap();
        assert!(record_scan(&db, &scan(12, 1), now()).is_ok());
    }

    #[test]
    fn test_other_parts_are_independent() {
        let db = Database::open_in_memory().unwrap();
        record_scan(&db, &scan(10, 1), now()).unwrap();
        assert!(record_scan(&db, &scan(13, 1), now()).is_ok());
    }

    #[test]
    fn test_custom_cooldown() {
        let db = Database::open_in_memory().unwrap();
        record_scan(&db, &scan(14, 1), now() - Duration::minutes(10)).unwrap();
        assert!(record_scan_with_cooldown(&db, &scan(14, 1), now(), Duration::minutes(5)).is_ok());
    }

    #[test]
    fn test_accepted_scan_is_audited() {
        let db = Database::open_in_memory().unwrap();
        record_scan(&db, &scan(10, 3), now()).unwrap();
        record_scan(&db, &scan(10, 3), now()).unwrap_err();

        let rows = db
            .with_conn(|conn| audit_repo::for_order(conn, "o-1"))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "PART_SCANNED");
    }
}
