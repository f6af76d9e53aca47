//! Explicit order status transitions.

use chrono::Utc;
use serde_json::json;

use crate::audit::{self, AuditAction, AuditEvent};
use crate::db::outbox_repo::{self, Operation};
use crate::db::{order_repo, Database};
use crate::error::{Result, ValidationError};

use super::OrderStatus;

/// Entity tag used for orders in the integration outbox.
pub const ORDER_ENTITY: &str = "order";

/// Moves an order to `to`, returning the previous status.
///
/// The status write, its audit row and the outbox UPDATE commit together.
/// `max_retries` is the delivery budget given to the outbox item.
pub fn transition(
    db: &Database,
    order_id: &str,
    to: OrderStatus,
    actor: Option<&str>,
    max_retries: u32,
) -> Result<OrderStatus> {
    db.with_tx(|tx| {
        let from = order_repo::status_of(tx, order_id)?
            .ok_or_else(|| ValidationError::new("order_id", "order not found"))?;

        if !from.can_transition_to(to) {
            return Err(ValidationError::new(
                "status",
                format!("cannot move order from {} to {}", from, to),
            )
            .into());
        }

        let now = Utc::now();
        order_repo::set_status(tx, order_id, to, now)?;
        audit::record(
            tx,
            &AuditEvent::new(AuditAction::OrderStatusChanged, format!("{} -> {}", from, to))
                .by(actor)
                .for_order(order_id)
                .at(now),
        )?;
        outbox_repo::enqueue(
            tx,
            ORDER_ENTITY,
            order_id,
            Operation::Update,
            &json!({ "id": order_id, "status": to.as_str() }),
            max_retries,
        )?;

        log::info!("Order {} moved {} -> {}", order_id, from, to);
        Ok(from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::audit_repo;
    use crate::db::outbox_repo::DEFAULT_MAX_RETRIES;
    use crate::error::OptiplanError;
    use crate::order::{Material, Order, OrderPart, PartGroup};
    use rust_decimal::Decimal;

    fn stored_order(db: &Database) -> Order {
        let order = Order::new("Ahmet", Material::new(Decimal::from(18), "Beyaz", "MDF"))
            .with_part(OrderPart::new(PartGroup::Govde, 700, 500, 1).with_grain("1"));
        db.with_conn(|conn| order_repo::insert(conn, &order)).unwrap();
        order
    }

    #[test]
    fn test_valid_transition_writes_audit_and_outbox() {
        let db = Database::open_in_memory().unwrap();
        let order = stored_order(&db);

        let previous =
            transition(&db, &order.id, OrderStatus::Validated, Some("planner"), 2).unwrap();
        assert_eq!(previous, OrderStatus::New);

        db.with_conn(|conn| {
            assert_eq!(
                order_repo::status_of(conn, &order.id)?,
                Some(OrderStatus::Validated)
            );
            let audit = audit_repo::for_order(conn, &order.id)?;
            assert_eq!(audit.len(), 1);
            assert_eq!(audit[0].detail, "NEW -> VALIDATED");
            let outbox = outbox_repo::for_entity(conn, ORDER_ENTITY, &order.id)?;
            assert_eq!(outbox.len(), 1);
            assert_eq!(outbox[0].operation, Operation::Update);
            assert_eq!(outbox[0].payload["status"], "VALIDATED");
            assert_eq!(outbox[0].max_retries, 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_invalid_transition_is_validation_error() {
        let db = Database::open_in_memory().unwrap();
        let order = stored_order(&db);

        let err = transition(&db, &order.id, OrderStatus::Delivered, None, DEFAULT_MAX_RETRIES)
            .unwrap_err();
        match err {
            OptiplanError::Validation(e) => assert_eq!(e.field, "status"),
            other => panic!("unexpected error: {other}"),
        }

        db.with_conn(|conn| {
            assert!(outbox_repo::for_entity(conn, ORDER_ENTITY, &order.id)?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_unknown_order() {
        let db = Database::open_in_memory().unwrap();
        let err = transition(&db, "missing", OrderStatus::Validated, None, DEFAULT_MAX_RETRIES)
            .unwrap_err();
        assert!(matches!(err, OptiplanError::Validation(ref e) if e.field == "order_id"));
    }

    #[test]
    fn test_full_lifecycle_then_cancel_rejected() {
        let db = Database::open_in_memory().unwrap();
        let order = stored_order(&db);
        for next in [
            OrderStatus::Validated,
            OrderStatus::Exported,
            OrderStatus::DeliveryPending,
            OrderStatus::Delivered,
        ] {
            transition(&db, &order.id, next, None, DEFAULT_MAX_RETRIES).unwrap();
        }
        assert!(
            transition(&db, &order.id, OrderStatus::Cancelled, None, DEFAULT_MAX_RETRIES).is_err()
        );
    }
}
