//! Request/response shapes for the HTTP surface. Thin adapters over the engine types.

use chrono::NaiveDate;
use commerce_engine::db_types::{
    Money, NewOrder, NewOrderItem, Order, OrderStatusType, PaymentIntent, PaymentMethod,
    DEFAULT_WAREHOUSE,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutItem {
    pub product_id: String,
    pub variant_id: String,
    pub name: String,
    pub unit_price: Money,
    #[serde(default)]
    pub cost_price: Money,
    pub quantity: i64,
}

/// Checkout payload from the storefront. Cart contents arrive already sanitized and
/// priced; the engine re-validates shape and totals.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub items: Vec<CheckoutItem>,
    pub total_price: Money,
    #[serde(default)]
    pub discount_amount: Money,
    pub payment_method: PaymentMethod,
    pub warehouse_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,
}

impl CheckoutRequest {
    pub fn into_new_order(self) -> NewOrder {
        let items = self
            .items
            .into_iter()
            .map(|i| {
                NewOrderItem::new(i.product_id, i.variant_id, i.name, i.unit_price, i.quantity)
                    .with_cost_price(i.cost_price)
            })
            .collect();
        let mut order = NewOrder::new(self.customer_id, items, self.total_price)
            .with_payment_method(self.payment_method)
            .with_discount(self.discount_amount)
            .with_warehouse(self.warehouse_id.unwrap_or_else(|| DEFAULT_WAREHOUSE.to_string()));
        order.customer_name = self.customer_name;
        order.customer_email = self.customer_email;
        order.shipping_address = self.shipping_address;
        order
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order: Order,
    /// Present for online payments; COD orders have none.
    pub payment_intent: Option<PaymentIntent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    Success,
    Failure,
}

/// Provider callback: `{intent_id, outcome}` plus whatever reference the provider holds.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentWebhook {
    pub intent_id: String,
    pub outcome: WebhookOutcome,
    pub provider_reference: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatusType,
    pub actor_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundRequest {
    pub amount: Money,
    pub reason: Option<String>,
    pub actor_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatusType>,
    pub customer_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub oldest_first: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeriodCreateRequest {
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeriodCloseRequest {
    pub admin_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeriodReopenRequest {
    pub admin_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockIncreaseRequest {
    pub warehouse_id: Option<String>,
    pub variant_id: String,
    pub quantity: i64,
}
