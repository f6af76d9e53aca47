//! Public, unauthenticated order tracking.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{order_repo, Database};
use crate::error::TrackingError;
use crate::order::Order;
use crate::sanitize::redact_token;

/// Shorter tokens are rejected before touching the database.
pub const MIN_TOKEN_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialSummary {
    pub name: String,
    pub thickness_mm: Decimal,
    pub color: String,
}

/// The only projection of an order that leaves through the tracking page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub tracking_code: String,
    pub customer_name: String,
    pub status: String,
    pub material: MaterialSummary,
    pub part_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            tracking_code: order.tracking_token.clone(),
            customer_name: order.customer_name.clone(),
            status: order.status.as_str().to_string(),
            material: MaterialSummary {
                name: order.material.name.clone(),
                thickness_mm: order.material.thickness_mm,
                color: order.material.color.clone(),
            },
            part_count: order.parts.len(),
            created_at: order.created_at,
        }
    }
}

/// Looks up an order by tracking token. Read only.
pub fn lookup(db: &Database, token: &str) -> Result<OrderSummary, TrackingError> {
    let token = token.trim();
    let _span = tracing::debug_span!("tracking.lookup", token = %redact_token(token)).entered();

    if token.chars().count() < MIN_TOKEN_LEN {
        return Err(TrackingError::InvalidToken);
    }

    let order = db
        .with_conn(|conn| order_repo::find_by_tracking_token(conn, token))?
        .ok_or(TrackingError::NotFound)?;
    Ok(OrderSummary::from(&order))
}
