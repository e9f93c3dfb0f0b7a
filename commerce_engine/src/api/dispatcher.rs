use log::{error, info};
use thiserror::Error;

use crate::{
    api::{ledger_api::LedgerApi, order_flow_api::OrderFlowApi},
    db_types::{ActorRole, Money, OrderId, OrderStatusType, RevenueRecognition, SYSTEM_ACTOR},
    events::EventProducers,
    traits::{CommerceDatabase, LedgerDatabase, LedgerError, OrderChange, OrderFlowError},
};

/// Ties the order lifecycle to its financial consequences.
///
/// The status transition commits first; the ledger work then runs in its own
/// transaction. `delivered` recognizes revenue, `cancelled` reverses any prior
/// recognition. Recognition is idempotent, so a retry after a ledger failure cannot
/// double-post.
pub struct LifecycleDispatcher<B> {
    orders: OrderFlowApi<B>,
    ledger: LedgerApi<B>,
}

#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    OrderFlow(#[from] OrderFlowError),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
}

impl<B> LifecycleDispatcher<B>
where B: CommerceDatabase + LedgerDatabase
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { orders: OrderFlowApi::new(db.clone(), producers), ledger: LedgerApi::new(db) }
    }

    pub fn from_parts(orders: OrderFlowApi<B>, ledger: LedgerApi<B>) -> Self {
        Self { orders, ledger }
    }

    pub fn orders(&self) -> &OrderFlowApi<B> {
        &self.orders
    }

    pub fn ledger(&self) -> &LedgerApi<B> {
        &self.ledger
    }

    /// Perform a status transition and fan out its financial side effects.
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        actor: ActorRole,
        actor_id: Option<&str>,
    ) -> Result<OrderChange, LifecycleError> {
        let change = self.orders.update_order_status(order_id, new_status, actor, actor_id).await?;
        let recognized_by = match actor {
            ActorRole::Admin => actor_id.unwrap_or(SYSTEM_ACTOR),
            _ => SYSTEM_ACTOR,
        };
        match change.order.status {
            OrderStatusType::Delivered => {
                if let Err(e) = self.ledger.recognize_revenue(order_id, recognized_by).await {
                    error!("🔄️📒️ Delivery committed for {order_id} but revenue recognition failed: {e}");
                    return Err(e.into());
                }
            },
            OrderStatusType::Cancelled => {
                match self.ledger.reverse_revenue(order_id, "Order cancelled").await {
                    Ok(Some(_)) => info!("🔄️📒️ Recognition reversed for cancelled order {order_id}"),
                    Ok(None) => {},
                    Err(e) => {
                        error!("🔄️📒️ Cancellation committed for {order_id} but reversal failed: {e}");
                        return Err(e.into());
                    },
                }
            },
            _ => {},
        }
        Ok(change)
    }

    /// Post a partial refund against a delivered order's recognition. Returns the
    /// shrunken recognition, or `None` when the order has nothing recognized.
    pub async fn refund_order(
        &self,
        order_id: &OrderId,
        refund_amount: Money,
        reason: &str,
    ) -> Result<Option<RevenueRecognition>, LifecycleError> {
        let recognition = self.ledger.create_refund_entry(order_id, refund_amount, reason).await?;
        Ok(recognition)
    }
}
