//! Order transaction coordinator.

use std::future::Future;
use std::time::Instant;

use common::{Money, OrderId, ProductId, UserId};
use domain::{CreateOrderRequest, NewOrder, NewOrderItem, OrderLineRequest, OrderWithItems};
use order_store::{CommitUnit, OrderStore, StoreError};
use tokio_util::sync::CancellationToken;

use crate::error::{CheckoutError, Phase, Result};

/// A request line after validation, with the price observed at that time.
#[derive(Debug, Clone)]
struct PricedLine {
    product_id: ProductId,
    quantity: u32,
    unit_price: Money,
    observed_stock: u32,
}

/// Creates orders against an [`OrderStore`].
///
/// Order creation runs in four steps:
/// 1. Validate every line against current stock and price it
/// 2. Write the order header
/// 3. Write every line and decrement its stock inside one commit unit
/// 4. Read the finished order back
///
/// If step 3 fails the unit is rolled back and the header is deleted, so a
/// rejected order leaves neither lines nor stock changes behind. Stock is
/// re-checked at decrement time; a line that lost a race for the last units
/// fails with [`CheckoutError::InsufficientStock`].
///
/// Dropping the returned future while step 3 is in flight skips the header
/// delete. Callers that need to stop an order early should cancel through
/// [`OrderCoordinator::create_order_with_cancellation`] instead.
pub struct OrderCoordinator<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderCoordinator<S> {
    /// Creates a new coordinator over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order for `user_id` from the request lines.
    pub async fn create_order(
        &self,
        user_id: UserId,
        request: CreateOrderRequest,
    ) -> Result<OrderWithItems> {
        self.create_order_with_cancellation(user_id, request, &CancellationToken::new())
            .await
    }

    /// Creates an order, stopping early once `cancel` fires.
    ///
    /// Cancellation before the header write has no side effects. Cancellation
    /// during the commit pass compensates like any other commit failure.
    #[tracing::instrument(skip(self, request, cancel), fields(lines = request.lines.len()))]
    pub async fn create_order_with_cancellation(
        &self,
        user_id: UserId,
        request: CreateOrderRequest,
        cancel: &CancellationToken,
    ) -> Result<OrderWithItems> {
        metrics::counter!("checkout_create_order_total").increment(1);
        let start = Instant::now();

        let result = self.run(user_id, request, cancel).await;

        metrics::histogram!("checkout_create_order_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("checkout_orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id(),
                    total = %order.order.total,
                    items = order.item_count(),
                    "order created"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_orders_rejected_total", "reason" => e.kind())
                    .increment(1);
                if e.is_client_error() {
                    tracing::info!(error = %e, "order rejected");
                } else {
                    tracing::warn!(error = %e, "order creation failed");
                }
            }
        }

        result
    }

    async fn run(
        &self,
        user_id: UserId,
        request: CreateOrderRequest,
        cancel: &CancellationToken,
    ) -> Result<OrderWithItems> {
        check_preconditions(&request.lines)?;

        let (lines, total) = self.price_lines(&request.lines, cancel).await?;

        if cancel.is_cancelled() {
            return Err(CheckoutError::Cancelled {
                phase: Phase::Validation,
            });
        }

        let order = self
            .store
            .create_order_header(NewOrder {
                user_id,
                total,
                shipping: request.shipping,
            })
            .await
            .map_err(|e| CheckoutError::persistence(Phase::HeaderWrite, e))?;
        tracing::debug!(order_id = %order.id, "order header written");

        if let Err(e) = self.commit_lines(order.id, &lines, cancel).await {
            return Err(self.compensate(order.id, e).await);
        }

        // The lines are committed at this point; a failed read leaves them in
        // place and only the response is lost.
        match self.store.fetch_order_with_items(order.id).await {
            Ok(Some(created)) => Ok(created),
            Ok(None) => Err(CheckoutError::Persistence {
                phase: Phase::ReadBack,
                detail: format!("order {} not found after commit", order.id),
            }),
            Err(e) => Err(CheckoutError::persistence(Phase::ReadBack, e)),
        }
    }

    /// Reads each product, checks its stock and prices the line.
    async fn price_lines(
        &self,
        requested: &[OrderLineRequest],
        cancel: &CancellationToken,
    ) -> Result<(Vec<PricedLine>, Money)> {
        let mut lines = Vec::with_capacity(requested.len());
        let mut total = Money::zero();

        for line in requested {
            let product = or_cancelled(
                cancel,
                Phase::Validation,
                self.store.get_product(&line.product_id),
            )
            .await?
            .map_err(|e| CheckoutError::persistence(Phase::Validation, e))?
            .ok_or_else(|| CheckoutError::ProductNotFound(line.product_id.clone()))?;

            if !product.can_fulfill(line.quantity) {
                return Err(CheckoutError::InsufficientStock {
                    product_id: product.id,
                    available: product.stock,
                    requested: line.quantity,
                });
            }

            total = product
                .price
                .checked_multiply(line.quantity)
                .and_then(|line_total| total.checked_add(line_total))
                .ok_or(CheckoutError::TotalOverflow)?;

            lines.push(PricedLine {
                product_id: product.id,
                quantity: line.quantity,
                unit_price: product.price,
                observed_stock: product.stock,
            });
        }

        Ok((lines, total))
    }

    /// Writes every line and decrements its stock inside one commit unit.
    async fn commit_lines(
        &self,
        order_id: OrderId,
        lines: &[PricedLine],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut unit = self
            .store
            .begin_commit()
            .await
            .map_err(|e| CheckoutError::persistence(Phase::Commit, e))?;

        match apply_lines(unit.as_mut(), order_id, lines, cancel).await {
            Ok(()) => unit
                .commit()
                .await
                .map_err(|e| CheckoutError::persistence(Phase::Commit, e)),
            Err(e) => {
                if let Err(rollback) = unit.rollback().await {
                    tracing::warn!(%order_id, error = %rollback, "commit unit rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Deletes the order header after a failed commit pass.
    async fn compensate(&self, order_id: OrderId, original: CheckoutError) -> CheckoutError {
        metrics::counter!("checkout_compensations_total").increment(1);
        tracing::info!(%order_id, error = %original, "compensating: deleting order");

        match self.store.delete_order(order_id).await {
            Ok(()) => original,
            Err(e) => {
                metrics::counter!("checkout_compensation_failures_total").increment(1);
                tracing::error!(
                    %order_id,
                    original = %original,
                    error = %e,
                    "compensating delete failed, order needs reconciliation"
                );
                CheckoutError::CompensationFailed {
                    order_id,
                    original: Box::new(original),
                    detail: e.to_string(),
                }
            }
        }
    }
}

fn check_preconditions(lines: &[OrderLineRequest]) -> Result<()> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }
    if let Some(line) = lines.iter().find(|line| line.quantity == 0) {
        return Err(CheckoutError::InvalidQuantity {
            product_id: line.product_id.clone(),
            quantity: line.quantity,
        });
    }
    Ok(())
}

async fn apply_lines(
    unit: &mut dyn CommitUnit,
    order_id: OrderId,
    lines: &[PricedLine],
    cancel: &CancellationToken,
) -> Result<()> {
    for line in lines {
        let item = NewOrderItem {
            order_id,
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        };
        or_cancelled(cancel, Phase::ItemWrite, unit.create_order_item(item))
            .await?
            .map_err(|e| commit_error(Phase::ItemWrite, e))?;

        let remaining = or_cancelled(
            cancel,
            Phase::StockDecrement,
            unit.decrement_stock(&line.product_id, line.quantity),
        )
        .await?
        .map_err(|e| commit_error(Phase::StockDecrement, e))?;

        tracing::debug!(
            product_id = %line.product_id,
            observed = line.observed_stock,
            remaining,
            "stock decremented"
        );
    }
    Ok(())
}

/// Maps a store error raised inside the commit unit.
///
/// Stock and product errors mean the catalog changed after validation and
/// are reported as such rather than as storage faults.
fn commit_error(phase: Phase, err: StoreError) -> CheckoutError {
    match err {
        StoreError::InsufficientStock {
            product_id,
            available,
            requested,
        } => CheckoutError::InsufficientStock {
            product_id,
            available,
            requested,
        },
        StoreError::ProductNotFound(product_id) => CheckoutError::ProductNotFound(product_id),
        other => CheckoutError::persistence(phase, other),
    }
}

async fn or_cancelled<F: Future>(
    cancel: &CancellationToken,
    phase: Phase,
    future: F,
) -> Result<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CheckoutError::Cancelled { phase }),
        output = future => Ok(output),
    }
}
