use crate::{
    api::order_objects::OrderQueryFilter,
    db_types::{InventoryLevel, Order, OrderId, OrderItem, OrderStatusHistory, PaymentIntent},
    traits::{
        commerce_database::OrderFlowError,
        data_objects::{OrderDetails, OrderListing, Pagination},
    },
};

/// Read models over orders, inventory and payment intents. No method here mutates
/// anything.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// The order for the given public id, if it exists.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    /// The order plus its line items and transition history (admin view).
    async fn fetch_order_details(&self, order_id: &OrderId) -> Result<Option<OrderDetails>, OrderFlowError>;

    async fn fetch_order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderFlowError>;

    /// Transition history, newest first.
    async fn fetch_order_history(&self, order_id: &OrderId)
        -> Result<Vec<OrderStatusHistory>, OrderFlowError>;

    /// Filtered, paginated order listing with the total match count.
    async fn fetch_orders(
        &self,
        filter: OrderQueryFilter,
        pagination: Pagination,
    ) -> Result<OrderListing, OrderFlowError>;

    async fn fetch_inventory_level(
        &self,
        warehouse_id: &str,
        variant_id: &str,
    ) -> Result<Option<InventoryLevel>, OrderFlowError>;

    async fn fetch_payment_intent(&self, intent_id: &str) -> Result<Option<PaymentIntent>, OrderFlowError>;

    /// The intent attached to an order, if any. 1:1 — an order has at most one.
    async fn fetch_payment_intent_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<PaymentIntent>, OrderFlowError>;
}
