use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    api::order_objects::OrderQueryFilter,
    db_types::{
        ActorRole, InventoryLevel, Money, NewOrder, Order, OrderId, OrderStatusType, PaymentIntent,
    },
    events::{EventProducers, OrderAnnulledEvent, OrderDeliveredEvent, OrderPaidEvent},
    traits::{
        CommerceDatabase, OrderChange, OrderDetails, OrderFlowError, OrderListing, Pagination,
        SweepResult,
    },
};

pub const DEFAULT_INTENT_TTL_MINUTES: i64 = 15;
pub const DEFAULT_ZOMBIE_THRESHOLD_MINUTES: i64 = 30;

/// `OrderFlowApi` is the primary API for the order lifecycle: checkout, the status state
/// machine, payment intents and the reclamation sweepers.
///
/// Cancellation is deliberately not a public method here. The only way to cancel an order
/// from outside the engine is [`Self::update_order_status`] with `cancelled`, which —
/// like payment failure and the zombie sweep — funnels into the backend's single internal
/// cancellation routine.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    intent_ttl: Duration,
    zombie_threshold: Duration,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self {
            db,
            producers,
            intent_ttl: Duration::minutes(DEFAULT_INTENT_TTL_MINUTES),
            zombie_threshold: Duration::minutes(DEFAULT_ZOMBIE_THRESHOLD_MINUTES),
        }
    }

    /// How long a payment intent stays confirmable.
    pub fn with_intent_ttl(mut self, ttl: Duration) -> Self {
        self.intent_ttl = ttl;
        self
    }

    /// How old a pending, intent-less online order must be before the zombie sweep
    /// cancels it.
    pub fn with_zombie_threshold(mut self, threshold: Duration) -> Self {
        self.zombie_threshold = threshold;
        self
    }
}

impl<B> OrderFlowApi<B>
where B: CommerceDatabase
{
    /// Submit a checkout. Validates the payload, reserves stock for every line
    /// (all-or-nothing) and stores the order as `pending`, in one transaction.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        let created = self.db.create_order(order).await?;
        debug!("🔄️📦️ Order {} processing complete", created.order_id);
        Ok(created)
    }

    /// Move an order through the state machine on behalf of `actor`.
    ///
    /// The transition table and role policy are enforced before anything is written; the
    /// status row, its side effects (stock commit/release) and the history row land in
    /// one transaction. Admin calls must supply `actor_id` for the audit trail.
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        actor: ActorRole,
        actor_id: Option<&str>,
    ) -> Result<OrderChange, OrderFlowError> {
        let change = self.db.update_order_status(order_id, new_status, actor, actor_id).await?;
        match change.order.status {
            OrderStatusType::Cancelled => self.call_order_annulled_hook(&change.order).await,
            OrderStatusType::Delivered => self.call_order_delivered_hook(&change.order).await,
            _ => {},
        }
        Ok(change)
    }

    /// Create a pending payment intent for an online-payment order. The intent pins the
    /// amount the provider is expected to confirm; it expires after the configured TTL
    /// (default 15 minutes).
    pub async fn create_payment_intent(
        &self,
        order_id: &OrderId,
        amount: Money,
    ) -> Result<PaymentIntent, OrderFlowError> {
        let intent = self.db.create_payment_intent(order_id, amount, self.intent_ttl).await?;
        debug!("💳️ Intent {} created for order {order_id}, expires {}", intent.intent_id, intent.expires_at);
        Ok(intent)
    }

    /// Provider confirmation. This is the only path that marks an order paid: the intent
    /// must still be pending and unexpired, and its amount must match the order's stored
    /// total. On success the order is paid, its reserved stock committed, and the
    /// order-paid hook fires.
    pub async fn confirm_payment_intent(&self, intent_id: &str) -> Result<Order, OrderFlowError> {
        let order = self.db.confirm_payment_intent(intent_id).await?;
        self.call_order_paid_hook(&order).await;
        Ok(order)
    }

    /// Provider rejection (or TTL expiry, from the sweeper). Idempotent: failing an
    /// unknown or already-finalized intent is a no-op returning `None`, so webhook
    /// retries never error.
    pub async fn fail_payment_intent(
        &self,
        intent_id: &str,
        reason: &str,
    ) -> Result<Option<Order>, OrderFlowError> {
        let expire = reason == "Reservation expired";
        let cancelled = self.db.fail_payment_intent(intent_id, reason, expire).await?;
        if let Some(order) = &cancelled {
            self.call_order_annulled_hook(order).await;
        }
        Ok(cancelled)
    }

    /// Sweeper: fail every pending intent whose TTL has lapsed. Per-row failures are
    /// logged and counted, never propagated — one bad row must not stall the batch.
    /// Safe to run concurrently with itself and with live confirmations: each intent is
    /// re-validated inside its own transaction.
    pub async fn process_expired_payments(&self) -> Result<SweepResult, OrderFlowError> {
        let expired = self.db.fetch_expired_intents(Utc::now()).await?;
        if expired.is_empty() {
            return Ok(SweepResult::default());
        }
        info!("🕰️ {} expired payment intent(s) to clean up", expired.len());
        let mut result = SweepResult::default();
        for intent in expired {
            match self.fail_payment_intent(&intent.intent_id, "Reservation expired").await {
                Ok(_) => result.processed += 1,
                Err(e) => {
                    error!("🕰️ Failed to expire intent {}: {e}", intent.intent_id);
                    result.failed += 1;
                },
            }
        }
        Ok(result)
    }

    /// Sweeper: cancel abandoned checkouts — orders still pending past the threshold with
    /// no payment intent and a non-COD payment method. COD orders never have an intent
    /// and are exempt by definition. Per-row failures are isolated.
    pub async fn process_zombie_orders(&self) -> Result<SweepResult, OrderFlowError> {
        let cutoff = Utc::now() - self.zombie_threshold;
        let zombies = self.db.fetch_zombie_orders(cutoff).await?;
        if zombies.is_empty() {
            return Ok(SweepResult::default());
        }
        info!("🕰️ {} zombie order(s) to cancel", zombies.len());
        let mut result = SweepResult::default();
        for zombie in zombies {
            match self.db.cancel_order(&zombie.order_id, "Abandoned checkout (zombie)").await {
                Ok(change) => {
                    self.call_order_annulled_hook(&change.order).await;
                    result.processed += 1;
                },
                Err(e) => {
                    error!("🕰️ Failed to cancel zombie order {}: {e}", zombie.order_id);
                    result.failed += 1;
                },
            }
        }
        Ok(result)
    }

    /// Restocking / returns / transfers in: unconditional increase of `available`.
    pub async fn increase_stock(
        &self,
        warehouse_id: &str,
        variant_id: &str,
        quantity: i64,
    ) -> Result<InventoryLevel, OrderFlowError> {
        self.db.increase_stock(warehouse_id, variant_id, quantity).await
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        self.db.fetch_order(order_id).await
    }

    /// Admin view: order plus items plus history.
    pub async fn fetch_order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, OrderFlowError> {
        self.db.fetch_order_details(order_id).await
    }

    pub async fn fetch_orders(
        &self,
        filter: OrderQueryFilter,
        pagination: Pagination,
    ) -> Result<OrderListing, OrderFlowError> {
        self.db.fetch_orders(filter, pagination).await
    }

    pub async fn fetch_inventory_level(
        &self,
        warehouse_id: &str,
        variant_id: &str,
    ) -> Result<Option<InventoryLevel>, OrderFlowError> {
        self.db.fetch_inventory_level(warehouse_id, variant_id).await
    }

    pub async fn fetch_payment_intent(&self, intent_id: &str) -> Result<Option<PaymentIntent>, OrderFlowError> {
        self.db.fetch_payment_intent(intent_id).await
    }

    async fn call_order_paid_hook(&self, order: &Order) {
        for emitter in &self.producers.order_paid_producer {
            debug!("🔄️💳️ Notifying order-paid subscribers");
            emitter.publish_event(OrderPaidEvent::new(order.clone())).await;
        }
    }

    async fn call_order_annulled_hook(&self, order: &Order) {
        for emitter in &self.producers.order_annulled_producer {
            debug!("🔄️❌️ Notifying order-annulled subscribers");
            emitter.publish_event(OrderAnnulledEvent::new(order.clone())).await;
        }
    }

    async fn call_order_delivered_hook(&self, order: &Order) {
        for emitter in &self.producers.order_delivered_producer {
            debug!("🔄️📦️ Notifying order-delivered subscribers");
            emitter.publish_event(OrderDeliveredEvent::new(order.clone())).await;
        }
    }
}
