//! Order lifecycle transitions.
//!
//! Status and payment status are independent axes. The lifecycle names the
//! transitions the system itself performs (creation, payment outcome); any
//! other combination can still be written by an administrator through a plain
//! [`StatusUpdate`]. There is no transition table: `DELIVERED -> PENDING` is
//! accepted. Cancelling an order does not return stock.

use serde::{Deserialize, Serialize};

use crate::order::{OrderStatus, PaymentStatus};

/// A partial update of an order's status fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
}

impl StatusUpdate {
    pub fn new(status: OrderStatus, payment_status: Option<PaymentStatus>) -> Self {
        Self {
            status,
            payment_status,
        }
    }
}

/// Transitions driven by the system rather than by an administrator.
#[derive(Debug, Clone, Copy)]
pub struct OrderLifecycle;

impl OrderLifecycle {
    /// State of every freshly created order.
    pub fn initial() -> (OrderStatus, PaymentStatus) {
        (OrderStatus::Pending, PaymentStatus::Pending)
    }

    /// Update applied when the payment provider confirms a charge.
    pub fn payment_confirmed() -> StatusUpdate {
        StatusUpdate::new(OrderStatus::Processing, Some(PaymentStatus::Paid))
    }

    /// Update applied when the payment provider declines a charge.
    ///
    /// The fulfillment status is carried over unchanged.
    pub fn payment_failed(current: OrderStatus) -> StatusUpdate {
        StatusUpdate::new(current, Some(PaymentStatus::Failed))
    }

    /// Administrative update. Always accepted.
    pub fn administrative(
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> StatusUpdate {
        StatusUpdate::new(status, payment_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(
            OrderLifecycle::initial(),
            (OrderStatus::Pending, PaymentStatus::Pending)
        );
    }

    #[test]
    fn test_payment_confirmed_moves_to_processing_paid() {
        let update = OrderLifecycle::payment_confirmed();
        assert_eq!(update.status, OrderStatus::Processing);
        assert_eq!(update.payment_status, Some(PaymentStatus::Paid));
    }

    #[test]
    fn test_payment_failed_keeps_status() {
        let update = OrderLifecycle::payment_failed(OrderStatus::Pending);
        assert_eq!(update.status, OrderStatus::Pending);
        assert_eq!(update.payment_status, Some(PaymentStatus::Failed));
    }

    #[test]
    fn test_administrative_updates_are_permissive() {
        // Leaving a terminal state is allowed.
        let update = OrderLifecycle::administrative(OrderStatus::Pending, None);
        assert!(OrderStatus::Delivered.is_terminal());
        assert_eq!(update.status, OrderStatus::Pending);
        assert_eq!(update.payment_status, None);
    }

    #[test]
    fn test_status_update_wire_shape() {
        let update: StatusUpdate =
            serde_json::from_str(r#"{"status":"SHIPPED"}"#).unwrap();
        assert_eq!(update, StatusUpdate::new(OrderStatus::Shipped, None));

        let update: StatusUpdate =
            serde_json::from_str(r#"{"status":"CANCELLED","paymentStatus":"REFUNDED"}"#)
                .unwrap();
        assert_eq!(update.payment_status, Some(PaymentStatus::Refunded));
    }
}
