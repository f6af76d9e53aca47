//! Price list repository: `price_upload_jobs` and `price_items`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{parse_timestamp, timestamp, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriceJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PriceJobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceJobStatus::Pending => "PENDING",
            PriceJobStatus::Processing => "PROCESSING",
            PriceJobStatus::Completed => "COMPLETED",
            PriceJobStatus::Failed => "FAILED",
        }
    }

    fn parse(raw: &str) -> Result<Self, DatabaseError> {
        match raw {
            "PENDING" => Ok(PriceJobStatus::Pending),
            "PROCESSING" => Ok(PriceJobStatus::Processing),
            "COMPLETED" => Ok(PriceJobStatus::Completed),
            "FAILED" => Ok(PriceJobStatus::Failed),
            other => Err(DatabaseError::decode(
                "status",
                format!("unknown job status '{}'", other),
            )),
        }
    }
}

impl fmt::Display for PriceJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a job's file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobSource {
    Upload,
    Device,
}

impl JobSource {
    pub fn as_str(self) -> &'static str {
        match self {
            JobSource::Upload => "UPLOAD",
            JobSource::Device => "DEVICE",
        }
    }

    fn parse(raw: &str) -> Result<Self, DatabaseError> {
        match raw {
            "UPLOAD" => Ok(JobSource::Upload),
            "DEVICE" => Ok(JobSource::Device),
            other => Err(DatabaseError::decode(
                "source",
                format!("unknown job source '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceUploadJob {
    pub id: String,
    pub status: PriceJobStatus,
    pub source: JobSource,
    pub supplier: Option<String>,
    pub original_filename: String,
    pub content_type: Option<String>,
    pub file_bytes: Vec<u8>,
    pub rows_extracted: u32,
    pub error_message: Option<String>,
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw job row as stored.
#[derive(Debug, Clone)]
struct PriceJobRow {
    id: String,
    status: String,
    source: String,
    supplier: Option<String>,
    original_filename: String,
    content_type: Option<String>,
    file_bytes: Vec<u8>,
    rows_extracted: u32,
    error_message: Option<String>,
    uploaded_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl PriceJobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            source: row.get("source")?,
            supplier: row.get("supplier")?,
            original_filename: row.get("original_filename")?,
            content_type: row.get("content_type")?,
            file_bytes: row.get("file_bytes")?,
            rows_extracted: row.get("rows_extracted")?,
            error_message: row.get("error_message")?,
            uploaded_by: row.get("uploaded_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_job(self) -> Result<PriceUploadJob, DatabaseError> {
        Ok(PriceUploadJob {
            status: PriceJobStatus::parse(&self.status)?,
            source: JobSource::parse(&self.source)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            supplier: self.supplier,
            original_filename: self.original_filename,
            content_type: self.content_type,
            file_bytes: self.file_bytes,
            rows_extracted: self.rows_extracted,
            error_message: self.error_message,
            uploaded_by: self.uploaded_by,
        })
    }
}

/// One normalised price list row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceItem {
    pub product_code: Option<String>,
    pub product_name: String,
    pub unit: String,
    pub list_price: Option<Decimal>,
    pub discount_rate: Option<Decimal>,
    pub net_price: Option<Decimal>,
    pub vat_rate: Decimal,
    pub vat_inclusive_price: Option<Decimal>,
    pub currency: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub supplier: Option<String>,
}

impl PriceItem {
    pub const DEFAULT_UNIT: &'static str = "ADET";
    pub const DEFAULT_CURRENCY: &'static str = "TRY";

    pub fn default_vat_rate() -> Decimal {
        Decimal::from(20)
    }

    pub fn named(product_name: impl Into<String>) -> Self {
        Self {
            product_code: None,
            product_name: product_name.into(),
            unit: Self::DEFAULT_UNIT.to_string(),
            list_price: None,
            discount_rate: None,
            net_price: None,
            vat_rate: Self::default_vat_rate(),
            vat_inclusive_price: None,
            currency: Self::DEFAULT_CURRENCY.to_string(),
            category: None,
            brand: None,
            supplier: None,
        }
    }
}

fn decimal_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.normalize().to_string())
}

fn decode_decimal(column: &str, raw: Option<String>) -> Result<Option<Decimal>, DatabaseError> {
    raw.map(|r| Decimal::from_str(&r).map_err(|e| DatabaseError::decode(column, e)))
        .transpose()
}

/// Inserts a new job row.
pub fn insert_job(conn: &Connection, job: &PriceUploadJob) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO price_upload_jobs (id, status, source, supplier, original_filename,
         content_type, file_bytes, rows_extracted, error_message, uploaded_by, created_at,
         updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            job.id,
            job.status.as_str(),
            job.source.as_str(),
            job.supplier,
            job.original_filename,
            job.content_type,
            job.file_bytes,
            job.rows_extracted,
            job.error_message,
            job.uploaded_by,
            timestamp(job.created_at),
            timestamp(job.updated_at),
        ],
    )
    .map_err(DatabaseError::classify)?;
    Ok(())
}

/// Finds a job by its ID, including its file bytes.
pub fn find_job(conn: &Connection, id: &str) -> Result<Option<PriceUploadJob>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM price_upload_jobs WHERE id = ?1",
            params![id],
            PriceJobRow::from_row,
        )
        .optional()?;
    row.map(PriceJobRow::into_job).transpose()
}

/// Updates status, row count and error message of a job.
pub fn update_job_status(
    conn: &Connection,
    id: &str,
    status: PriceJobStatus,
    rows_extracted: u32,
    error_message: Option<&str>,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE price_upload_jobs SET status = ?2, rows_extracted = ?3, error_message = ?4,
         updated_at = ?5 WHERE id = ?1",
        params![id, status.as_str(), rows_extracted, error_message, timestamp(at)],
    )?;
    Ok(())
}

/// Removes all items previously extracted for a job. Returns the count removed.
pub fn delete_items_for_job(conn: &Connection, job_id: &str) -> Result<usize, DatabaseError> {
    let removed = conn.execute("DELETE FROM price_items WHERE job_id = ?1", params![job_id])?;
    Ok(removed)
}

/// Inserts items under a job, preserving their order.
pub fn insert_items(
    conn: &Connection,
    job_id: &str,
    items: &[PriceItem],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO price_items (job_id, product_code, product_name, unit, list_price,
         discount_rate, net_price, vat_rate, vat_inclusive_price, currency, category, brand,
         supplier)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    for item in items {
        stmt.execute(params![
            job_id,
            item.product_code,
            item.product_name,
            item.unit,
            decimal_text(item.list_price),
            decimal_text(item.discount_rate),
            decimal_text(item.net_price),
            item.vat_rate.normalize().to_string(),
            decimal_text(item.vat_inclusive_price),
            item.currency,
            item.category,
            item.brand,
            item.supplier,
        ])
        .map_err(DatabaseError::classify)?;
    }
    Ok(())
}

/// Items of a job in insertion order.
pub fn items_for_job(conn: &Connection, job_id: &str) -> Result<Vec<PriceItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT product_code, product_name, unit, list_price, discount_rate, net_price,
         vat_rate, vat_inclusive_price, currency, category, brand, supplier
         FROM price_items WHERE job_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![job_id], PriceItemRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(PriceItemRow::into_item).collect()
}

#[derive(Debug, Clone)]
struct PriceItemRow {
    product_code: Option<String>,
    product_name: String,
    unit: String,
    list_price: Option<String>,
    discount_rate: Option<String>,
    net_price: Option<String>,
    vat_rate: String,
    vat_inclusive_price: Option<String>,
    currency: String,
    category: Option<String>,
    brand: Option<String>,
    supplier: Option<String>,
}

impl PriceItemRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            product_code: row.get("product_code")?,
            product_name: row.get("product_name")?,
            unit: row.get("unit")?,
            list_price: row.get("list_price")?,
            discount_rate: row.get("discount_rate")?,
            net_price: row.get("net_price")?,
            vat_rate: row.get("vat_rate")?,
            vat_inclusive_price: row.get("vat_inclusive_price")?,
            currency: row.get("currency")?,
            category: row.get("category")?,
            brand: row.get("brand")?,
            supplier: row.get("supplier")?,
        })
    }

    fn into_item(self) -> Result<PriceItem, DatabaseError> {
        Ok(PriceItem {
            list_price: decode_decimal("list_price", self.list_price)?,
            discount_rate: decode_decimal("discount_rate", self.discount_rate)?,
            net_price: decode_decimal("net_price", self.net_price)?,
            vat_rate: decode_decimal("vat_rate", Some(self.vat_rate))?
                .unwrap_or_else(PriceItem::default_vat_rate),
            vat_inclusive_price: decode_decimal("vat_inclusive_price", self.vat_inclusive_price)?,
            product_code: self.product_code,
            product_name: self.product_name,
            unit: self.unit,
            currency: self.currency,
            category: self.category,
            brand: self.brand,
            supplier: self.supplier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use rust_decimal::prelude::FromPrimitive;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(id: &str) -> PriceUploadJob {
        let now = Utc::now();
        PriceUploadJob {
            id: id.to_string(),
            status: PriceJobStatus::Pending,
            source: JobSource::Upload,
            supplier: Some("Kastamonu".to_string()),
            original_filename: "fiyat.xlsx".to_string(),
            content_type: None,
            file_bytes: vec![1, 2, 3],
            rows_extracted: 0,
            error_message: None,
            uploaded_by: Some("admin".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_insert_and_find_job() {
        let db = test_db();
        db.with_conn(|conn| insert_job(conn, &sample_job("job-1")))
            .unwrap();

        let job = db
            .with_conn(|conn| find_job(conn, "job-1"))
            .unwrap()
            .unwrap();
        assert_eq!(job.status, PriceJobStatus::Pending);
        assert_eq!(job.source, JobSource::Upload);
        assert_eq!(job.file_bytes, vec![1, 2, 3]);
        assert!(db.with_conn(|conn| find_job(conn, "nope")).unwrap().is_none());
    }

    #[test]
    fn test_update_job_status() {
        let db = test_db();
        db.with_conn(|conn| {
            insert_job(conn, &sample_job("job-2"))?;
            update_job_status(conn, "job-2", PriceJobStatus::Failed, 0, Some("boom"), Utc::now())
        })
        .unwrap();

        let job = db
            .with_conn(|conn| find_job(conn, "job-2"))
            .unwrap()
            .unwrap();
        assert_eq!(job.status, PriceJobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_items_round_trip_and_delete() {
        let db = test_db();
        let mut item = PriceItem::named("MDF 18mm Beyaz");
        item.product_code = Some("MDF-18".to_string());
        item.list_price = Decimal::from_f64(1234.5);
        item.discount_rate = Some(Decimal::new(1500, 2));

        db.with_conn(|conn| {
            insert_job(conn, &sample_job("job-3"))?;
            insert_items(conn, "job-3", &[item.clone(), PriceItem::named("Sunta")])
        })
        .unwrap();

        let items = db.with_conn(|conn| items_for_job(conn, "job-3")).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_code.as_deref(), Some("MDF-18"));
        assert_eq!(items[0].list_price, Some(Decimal::new(12345, 1)));
        assert_eq!(items[0].discount_rate, Some(Decimal::from(15)));
        assert_eq!(items[1].unit, "ADET");
        assert_eq!(items[1].currency, "TRY");
        assert_eq!(items[1].vat_rate, Decimal::from(20));

        let removed = db
            .with_conn(|conn| delete_items_for_job(conn, "job-3"))
            .unwrap();
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_blank_product_name_rejected_by_storage() {
        let db = test_db();
        let result = db.with_conn(|conn| {
            insert_job(conn, &sample_job("job-4"))?;
            insert_items(conn, "job-4", &[PriceItem::named("   ")])
        });
        assert!(matches!(result, Err(DatabaseError::Constraint { .. })));
    }
}
