//! Payment gateway trait, in-memory gateway and the payment processor.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use common::{Money, OrderId};
use domain::{Order, OrderLifecycle, StatusUpdate};
use order_store::{OrderLedger, StoreError};

use crate::error::PaymentError;

/// Answer of a payment gateway to a charge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The charge went through.
    Approved { transaction_id: String },
    /// The charge was refused.
    Declined { reason: String },
}

/// Trait for charging an order's total.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges `amount` for the given order.
    async fn charge(&self, order_id: OrderId, amount: Money)
    -> Result<ChargeOutcome, PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    charges: Vec<(String, OrderId, Money)>,
    next_id: u32,
    decline: bool,
    unavailable: bool,
}

/// In-memory payment gateway that approves every charge unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline charges.
    pub fn set_decline(&self, decline: bool) {
        self.lock().decline = decline;
    }

    /// Configures the gateway to fail as if unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Returns the number of approved charges.
    pub fn charge_count(&self) -> usize {
        self.lock().charges.len()
    }

    /// Returns the amount charged under a transaction ID.
    pub fn charged_amount(&self, transaction_id: &str) -> Option<Money> {
        self.lock()
            .charges
            .iter()
            .find(|(id, _, _)| id == transaction_id)
            .map(|(_, _, amount)| *amount)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<ChargeOutcome, PaymentError> {
        let mut state = self.lock();

        if state.unavailable {
            return Err(PaymentError::Gateway("gateway unavailable".to_string()));
        }
        if state.decline {
            return Ok(ChargeOutcome::Declined {
                reason: "card declined".to_string(),
            });
        }

        state.next_id += 1;
        let transaction_id = format!("TXN-{:04}", state.next_id);
        state
            .charges
            .push((transaction_id.clone(), order_id, amount));

        Ok(ChargeOutcome::Approved { transaction_id })
    }
}

/// A confirmed payment.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    /// The order after the status update.
    pub order: Order,
    /// The gateway's transaction ID.
    pub transaction_id: String,
    /// The amount charged.
    pub amount: Money,
}

/// Charges orders and records the outcome on the order.
pub struct PaymentProcessor<S: OrderLedger, G: PaymentGateway> {
    ledger: S,
    gateway: G,
}

impl<S: OrderLedger, G: PaymentGateway> PaymentProcessor<S, G> {
    /// Creates a new payment processor.
    pub fn new(ledger: S, gateway: G) -> Self {
        Self { ledger, gateway }
    }

    /// Returns a reference to the gateway.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Charges the order total.
    ///
    /// The order is claimed as (PROCESSING, PAID) before the gateway is
    /// called, so a concurrent request for the same order fails with
    /// `AlreadyPaid` instead of charging twice. On decline the status is put
    /// back and the payment status becomes FAILED; a declined order can be
    /// paid again later. A gateway error restores the order as it was.
    #[tracing::instrument(skip(self))]
    pub async fn process_payment(&self, order_id: OrderId) -> Result<PaymentReceipt, PaymentError> {
        let claim = OrderLifecycle::payment_confirmed();
        let previous = match self.ledger.update_status_if_unpaid(order_id, claim).await {
            Ok(Some(previous)) => previous,
            Ok(None) => return Err(PaymentError::AlreadyPaid(order_id)),
            Err(StoreError::OrderNotFound(_)) => {
                return Err(PaymentError::OrderNotFound(order_id));
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = match self.gateway.charge(order_id, previous.total).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.release(&previous).await;
                return Err(e);
            }
        };

        match outcome {
            ChargeOutcome::Approved { transaction_id } => {
                let mut order = previous;
                order.apply(claim);
                metrics::counter!("payments_processed_total", "outcome" => "approved")
                    .increment(1);
                tracing::info!(%order_id, %transaction_id, amount = %order.total, "payment confirmed");
                Ok(PaymentReceipt {
                    amount: order.total,
                    order,
                    transaction_id,
                })
            }
            ChargeOutcome::Declined { reason } => {
                self.ledger
                    .update_order_status(order_id, OrderLifecycle::payment_failed(previous.status))
                    .await?;
                metrics::counter!("payments_processed_total", "outcome" => "declined")
                    .increment(1);
                tracing::warn!(%order_id, %reason, "payment declined");
                Err(PaymentError::Declined { order_id, reason })
            }
        }
    }

    /// Puts a claimed order back to its state before the claim.
    async fn release(&self, previous: &Order) {
        let restore = StatusUpdate::new(previous.status, Some(previous.payment_status));
        if let Err(e) = self.ledger.update_order_status(previous.id, restore).await {
            metrics::counter!("payments_release_failures_total").increment(1);
            tracing::error!(
                order_id = %previous.id,
                error = %e,
                "failed to release payment claim, order needs reconciliation"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;
    use domain::{NewOrder, OrderStatus, PaymentStatus, ShippingAddress, StatusUpdate};
    use order_store::{InMemoryOrderStore, OrderLedgerExt};

    /// Approves like the in-memory gateway, but only after giving other
    /// tasks a chance to run.
    #[derive(Clone, Default)]
    struct YieldingGateway {
        inner: InMemoryPaymentGateway,
    }

    #[async_trait]
    impl PaymentGateway for YieldingGateway {
        async fn charge(
            &self,
            order_id: OrderId,
            amount: Money,
        ) -> Result<ChargeOutcome, PaymentError> {
            tokio::task::yield_now().await;
            self.inner.charge(order_id, amount).await
        }
    }

    async fn pending_order(store: &InMemoryOrderStore) -> Order {
        store
            .create_order_header(NewOrder {
                user_id: UserId::new(),
                total: Money::from_cents(4250),
                shipping: ShippingAddress::new("1 Main Street", "Springfield", "12345", "US"),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_gateway_ids_are_sequential() {
        let gateway = InMemoryPaymentGateway::new();
        let first = gateway
            .charge(OrderId::new(), Money::from_dollars(1))
            .await
            .unwrap();
        let second = gateway
            .charge(OrderId::new(), Money::from_dollars(2))
            .await
            .unwrap();

        assert_eq!(
            first,
            ChargeOutcome::Approved {
                transaction_id: "TXN-0001".to_string()
            }
        );
        assert_eq!(
            second,
            ChargeOutcome::Approved {
                transaction_id: "TXN-0002".to_string()
            }
        );
        assert_eq!(gateway.charged_amount("TXN-0002"), Some(Money::from_dollars(2)));
    }

    #[tokio::test]
    async fn test_payment_confirms_order() {
        let store = InMemoryOrderStore::new();
        let order = pending_order(&store).await;
        let processor = PaymentProcessor::new(store.clone(), InMemoryPaymentGateway::new());

        let receipt = processor.process_payment(order.id).await.unwrap();

        assert_eq!(receipt.amount, Money::from_cents(4250));
        assert_eq!(receipt.order.status, OrderStatus::Processing);
        assert_eq!(receipt.order.payment_status, PaymentStatus::Paid);
        assert_eq!(processor.gateway().charge_count(), 1);
    }

    #[tokio::test]
    async fn test_second_payment_is_rejected() {
        let store = InMemoryOrderStore::new();
        let order = pending_order(&store).await;
        let processor = PaymentProcessor::new(store.clone(), InMemoryPaymentGateway::new());

        processor.process_payment(order.id).await.unwrap();
        let err = processor.process_payment(order.id).await.unwrap_err();

        assert!(matches!(err, PaymentError::AlreadyPaid(id) if id == order.id));
        assert_eq!(processor.gateway().charge_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_order() {
        let processor =
            PaymentProcessor::new(InMemoryOrderStore::new(), InMemoryPaymentGateway::new());
        let err = processor.process_payment(OrderId::new()).await.unwrap_err();
        assert!(matches!(err, PaymentError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn test_decline_marks_payment_failed_and_keeps_status() {
        let store = InMemoryOrderStore::new();
        let order = pending_order(&store).await;
        store
            .update_order_status(order.id, StatusUpdate::new(OrderStatus::Shipped, None))
            .await
            .unwrap();
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_decline(true);
        let processor = PaymentProcessor::new(store.clone(), gateway);

        let err = processor.process_payment(order.id).await.unwrap_err();
        assert!(matches!(err, PaymentError::Declined { .. }));

        let stored = store.fetch_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Shipped);
        assert_eq!(stored.payment_status, PaymentStatus::Failed);

        processor.gateway().set_decline(false);
        let receipt = processor.process_payment(order.id).await.unwrap();
        assert_eq!(receipt.order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_gateway_outage_leaves_order_untouched() {
        let store = InMemoryOrderStore::new();
        let order = pending_order(&store).await;
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_unavailable(true);
        let processor = PaymentProcessor::new(store.clone(), gateway);

        let err = processor.process_payment(order.id).await.unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));

        let stored = store.fetch_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_concurrent_payments_charge_once() {
        let store = InMemoryOrderStore::new();
        let order = pending_order(&store).await;
        let gateway = YieldingGateway::default();
        let processor = PaymentProcessor::new(store.clone(), gateway.clone());

        let (a, b) = tokio::join!(
            processor.process_payment(order.id),
            processor.process_payment(order.id)
        );

        assert_eq!(u8::from(a.is_ok()) + u8::from(b.is_ok()), 1);
        let rejected = if a.is_ok() { b } else { a };
        assert!(matches!(rejected, Err(PaymentError::AlreadyPaid(_))));
        assert_eq!(gateway.inner.charge_count(), 1);

        let stored = store.fetch_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_many_concurrent_payment_tasks_charge_once() {
        let store = InMemoryOrderStore::new();
        let order = pending_order(&store).await;
        let gateway = YieldingGateway::default();
        let processor = Arc::new(PaymentProcessor::new(store.clone(), gateway.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let processor = Arc::clone(&processor);
                tokio::spawn(async move { processor.process_payment(order.id).await })
            })
            .collect();

        let mut approved = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => approved += 1,
                Err(e) => assert!(matches!(e, PaymentError::AlreadyPaid(_))),
            }
        }
        assert_eq!(approved, 1);
        assert_eq!(gateway.inner.charge_count(), 1);
    }

    #[tokio::test]
    async fn test_gateway_outage_after_decline_keeps_failed_status() {
        let store = InMemoryOrderStore::new();
        let order = pending_order(&store).await;
        let processor = PaymentProcessor::new(store.clone(), InMemoryPaymentGateway::new());

        processor.gateway().set_decline(true);
        processor.process_payment(order.id).await.unwrap_err();
        processor.gateway().set_decline(false);
        processor.gateway().set_unavailable(true);
        processor.process_payment(order.id).await.unwrap_err();

        let stored = store.fetch_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
    }
}
