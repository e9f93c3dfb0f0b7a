use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    db_types::{
        ActorRole, InventoryLevel, Money, NewOrder, Order, OrderId, OrderStatusType, PaymentIntent,
        PaymentIntentStatus,
    },
    traits::{data_objects::OrderChange, OrderManagement},
};

/// The mutating half of a commerce backend: order creation, the status state machine,
/// payment intents and the inventory ledger.
///
/// Every method is one logical operation executed inside a single database transaction;
/// if it returns an error, nothing it did is visible. Stock mutations inside these
/// operations use conditional updates (guard predicate in the same statement), never
/// read-then-write, so concurrent checkouts cannot oversell.
#[allow(async_fn_in_trait)]
pub trait CommerceDatabase: Clone + OrderManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Validates the checkout payload, reserves stock for every line (all-or-nothing) and
    /// stores the order with `pending` status.
    async fn create_order(&self, order: NewOrder) -> Result<Order, OrderFlowError>;

    /// Moves an order through the state machine, with all the side effects the target
    /// status implies:
    ///
    /// * `paid` (non-COD): commit the reserved stock for every line and write an
    ///   inventory movement log row.
    /// * `delivered`: stamp `delivered_at`.
    /// * `cancelled`: delegate to the internal cancellation routine (see
    ///   [`Self::cancel_order`]).
    ///
    /// A history row is appended in the same transaction. Admin-triggered transitions
    /// must carry an `actor_id` and produce an audit log entry.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        actor: ActorRole,
        actor_id: Option<&str>,
    ) -> Result<OrderChange, OrderFlowError>;

    /// The engine's single cancellation path. Backend plumbing shared by manual
    /// cancellation, payment failure and the zombie sweep — not part of the public API
    /// surface (callers outside the engine go through [`Self::update_order_status`]).
    ///
    /// Idempotent: cancelling an already-cancelled order returns it unchanged. Otherwise
    /// the order's stock comes back — reserved stock is released for pending orders,
    /// committed stock returns to available for paid/shipped ones — the status flips to
    /// `cancelled` and a history row is appended.
    async fn cancel_order(&self, order_id: &OrderId, reason: &str) -> Result<OrderChange, OrderFlowError>;

    /// Creates a pending payment intent for an online-payment order, expiring after
    /// `ttl`. At most one intent per order; COD orders are rejected.
    async fn create_payment_intent(
        &self,
        order_id: &OrderId,
        amount: Money,
        ttl: Duration,
    ) -> Result<PaymentIntent, OrderFlowError>;

    /// Confirms a pending intent and, in the same transaction, marks the order paid and
    /// commits its reserved stock.
    ///
    /// Rejected when the intent is not pending (idempotency for webhook retries), when it
    /// has expired, and when its amount disagrees with the order's authoritative total by
    /// more than [`Money::EPSILON`] — the client-submitted amount is never trusted.
    async fn confirm_payment_intent(&self, intent_id: &str) -> Result<Order, OrderFlowError>;

    /// Marks a pending intent failed (or expired, when `expire` is set) and cancels its
    /// order through the internal cancellation routine. A no-op returning `None` when the
    /// intent is missing or already finalized, so webhook retries are harmless.
    async fn fail_payment_intent(
        &self,
        intent_id: &str,
        reason: &str,
        expire: bool,
    ) -> Result<Option<Order>, OrderFlowError>;

    /// All intents still `pending` whose `expires_at` lies before `now`.
    async fn fetch_expired_intents(&self, now: DateTime<Utc>) -> Result<Vec<PaymentIntent>, OrderFlowError>;

    /// Abandoned checkouts: orders still `pending`, created before `cutoff`, with no
    /// payment intent and a payment method other than cash-on-delivery. COD orders never
    /// have an intent and must not be swept.
    async fn fetch_zombie_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderFlowError>;

    /// Unconditionally adds `quantity` to `available` (restocking, returns, transfers),
    /// creating the inventory row if needed.
    async fn increase_stock(
        &self,
        warehouse_id: &str,
        variant_id: &str,
        quantity: i64,
    ) -> Result<InventoryLevel, OrderFlowError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderFlowError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid order data: {0}")]
    Validation(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Invalid transition: cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Access denied: role '{role}' may not move an order from {from} to {to}")]
    Forbidden { role: ActorRole, from: OrderStatusType, to: OrderStatusType },
    #[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    InsufficientStock { variant_id: String, requested: i64, available: i64 },
    #[error("Inventory error: {0}")]
    Inventory(String),
    #[error("{0}")]
    Payment(#[from] PaymentError),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Payment intent {0} not found")]
    IntentNotFound(String),
    #[error("Payment intent is already {0}")]
    AlreadyFinalized(PaymentIntentStatus),
    #[error("Payment intent has expired")]
    IntentExpired,
    #[error("Payment amount mismatch: intent={intent_amount}, order={order_total}")]
    AmountMismatch { intent_amount: Money, order_total: Money },
    #[error("Order {0} already has a payment intent")]
    IntentAlreadyExists(OrderId),
    #[error("Cash-on-delivery orders do not take payment intents")]
    CashOrder,
}
