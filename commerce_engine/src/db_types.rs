//! Row and value types shared between the storage backends and the public APIs.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

pub use commerce_common::Money;

/// Actor name recorded against engine-triggered changes (payment webhooks, sweepers).
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// Warehouse used when the caller does not specify one.
pub const DEFAULT_WAREHOUSE: &str = "main";

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        -------------------------------------------------------
/// Public, opaque order identifier (`ord-…`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn random() -> Self {
        Self(format!("ord-{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// Created at checkout; stock is reserved but payment has not been confirmed.
    Pending,
    /// Payment confirmed and reserved stock committed.
    Paid,
    /// Handed to the courier.
    Shipped,
    /// Received by the customer. Terminal; triggers revenue recognition.
    Delivered,
    /// Cancelled by an admin, the customer, a payment failure or a sweeper. Terminal.
    Cancelled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::Pending => "pending",
            OrderStatusType::Paid => "paid",
            OrderStatusType::Shipped => "shipped",
            OrderStatusType::Delivered => "delivered",
            OrderStatusType::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Delivered | OrderStatusType::Cancelled)
    }
}

//--------------------------------------    PaymentMethod      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery. No payment intent is ever created; money moves at the door.
    Cod,
    /// Any online payment channel that goes through a payment intent.
    Online,
}

impl PaymentMethod {
    pub fn is_cod(&self) -> bool {
        matches!(self, PaymentMethod::Cod)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cod => write!(f, "cod"),
            PaymentMethod::Online => write!(f, "online"),
        }
    }
}

//--------------------------------------      ActorRole        -------------------------------------------------------
/// Who is asking for a state change. The transition policy keys off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Customer,
    Admin,
    System,
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRole::Customer => write!(f, "customer"),
            ActorRole::Admin => write!(f, "admin"),
            ActorRole::System => write!(f, "system"),
        }
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
/// Checkout payload, already validated and priced by the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_id: String,
    pub items: Vec<NewOrderItem>,
    /// Authoritative total for the order, including discounts. Cents.
    pub total_price: Money,
    pub discount_amount: Money,
    pub payment_method: PaymentMethod,
    pub warehouse_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,
}

impl NewOrder {
    pub fn new(customer_id: impl Into<String>, items: Vec<NewOrderItem>, total_price: Money) -> Self {
        Self {
            order_id: OrderId::random(),
            customer_id: customer_id.into(),
            items,
            total_price,
            discount_amount: Money::ZERO,
            payment_method: PaymentMethod::Online,
            warehouse_id: DEFAULT_WAREHOUSE.to_string(),
            customer_name: None,
            customer_email: None,
            shipping_address: None,
        }
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    pub fn with_warehouse(mut self, warehouse_id: impl Into<String>) -> Self {
        self.warehouse_id = warehouse_id.into();
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount_amount = discount;
        self
    }

    pub fn with_shipping(
        mut self,
        name: impl Into<String>,
        email: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        self.customer_name = Some(name.into());
        self.customer_email = Some(email.into());
        self.shipping_address = Some(address.into());
        self
    }

    /// Shape check for checkout input. The total must agree with the line sum (net of discount)
    /// to within [`Money::EPSILON`].
    pub fn validate(&self) -> Result<(), String> {
        if self.customer_id.trim().is_empty() {
            return Err("customer_id must not be empty".to_string());
        }
        if self.items.is_empty() {
            return Err("order must contain at least one line item".to_string());
        }
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(format!("quantity for {} must be positive", item.variant_id));
            }
            if item.unit_price < Money::ZERO {
                return Err(format!("unit price for {} must not be negative", item.variant_id));
            }
        }
        let line_sum: Money = self.items.iter().map(|i| i.unit_price * i.quantity).sum();
        if !self.total_price.matches(line_sum - self.discount_amount) {
            return Err(format!(
                "total_price {} does not match line sum {} less discount {}",
                self.total_price, line_sum, self.discount_amount
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub variant_id: String,
    /// Display name captured at checkout time; later renames must not rewrite history.
    pub name: String,
    /// Sale price per unit at checkout time. Cents.
    pub unit_price: Money,
    /// Acquisition cost per unit at checkout time; feeds COGS at recognition.
    pub cost_price: Money,
    pub quantity: i64,
}

impl NewOrderItem {
    pub fn new(
        product_id: impl Into<String>,
        variant_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Money,
        quantity: i64,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            variant_id: variant_id.into(),
            name: name.into(),
            unit_price,
            cost_price: Money::ZERO,
            quantity,
        }
    }

    pub fn with_cost_price(mut self, cost: Money) -> Self {
        self.cost_price = cost;
        self
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub total_price: Money,
    pub discount_amount: Money,
    pub status: OrderStatusType,
    pub payment_method: PaymentMethod,
    pub warehouse_id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub variant_id: String,
    pub name: String,
    pub unit_price: Money,
    pub cost_price: Money,
    pub quantity: i64,
}

/// Append-only record of a single status transition. One row per transition,
/// written in the same transaction as the transition itself.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct OrderStatusHistory {
    pub id: i64,
    pub order_id: OrderId,
    pub from_status: OrderStatusType,
    pub to_status: OrderStatusType,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   InventoryLevel      -------------------------------------------------------
/// Per-warehouse, per-variant stock counters. Both counters are non-negative at all
/// times; the only legal mutations are the four ledger operations in `sqlite::inventory`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub id: i64,
    pub warehouse_id: String,
    pub variant_id: String,
    pub available: i64,
    pub reserved: i64,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    PaymentIntent      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentIntentStatus {
    /// Awaiting provider confirmation; expires at `expires_at`.
    Pending,
    /// Confirmed. Terminal.
    Succeeded,
    /// Rejected by the provider. Terminal.
    Failed,
    /// TTL elapsed before confirmation. Terminal.
    Expired,
}

impl Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentIntentStatus::Pending => "pending",
            PaymentIntentStatus::Succeeded => "succeeded",
            PaymentIntentStatus::Failed => "failed",
            PaymentIntentStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl PaymentIntentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentIntentStatus::Pending)
    }
}

/// Time-boxed promise to pay for exactly one order.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: i64,
    pub intent_id: String,
    pub order_id: OrderId,
    pub amount: Money,
    pub status: PaymentIntentStatus,
    pub expires_at: DateTime<Utc>,
    pub provider: String,
    pub provider_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn new_intent_id() -> String {
    format!("pi-{:016x}", rand::random::<u64>())
}

//--------------------------------------      Accounts         -------------------------------------------------------
/// High-level account kind; determines the normal balance side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountKind {
    /// Asset and expense accounts grow on the debit side; the rest grow on the credit side.
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountKind::Asset | AccountKind::Expense)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
    /// Cached running balance, maintained transactionally with every posted line.
    pub balance: Money,
}

//--------------------------------------    Journal types      -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub entry_date: NaiveDate,
    pub description: String,
    pub reference: Option<String>,
    pub order_id: Option<OrderId>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TransactionLine {
    pub id: i64,
    pub journal_entry_id: i64,
    pub account_code: String,
    pub debit: Money,
    pub credit: Money,
    pub description: Option<String>,
}

/// A balanced set of debit/credit postings representing one financial event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub description: String,
    pub reference: Option<String>,
    /// Posting date; defaults to today when absent. Checked against the period guard.
    pub entry_date: Option<NaiveDate>,
    pub lines: Vec<NewTransactionLine>,
    pub order_id: Option<OrderId>,
    pub created_by: String,
}

impl NewJournalEntry {
    pub fn new(description: impl Into<String>, lines: Vec<NewTransactionLine>) -> Self {
        Self {
            description: description.into(),
            reference: None,
            entry_date: None,
            lines,
            order_id: None,
            created_by: SYSTEM_ACTOR.to_string(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.entry_date = Some(date);
        self
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }

    pub fn total_debit(&self) -> Money {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> Money {
        self.lines.iter().map(|l| l.credit).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransactionLine {
    pub account_code: String,
    pub debit: Money,
    pub credit: Money,
    pub description: Option<String>,
}

impl NewTransactionLine {
    pub fn debit(account_code: impl Into<String>, amount: Money, description: impl Into<String>) -> Self {
        Self {
            account_code: account_code.into(),
            debit: amount,
            credit: Money::ZERO,
            description: Some(description.into()),
        }
    }

    pub fn credit(account_code: impl Into<String>, amount: Money, description: impl Into<String>) -> Self {
        Self {
            account_code: account_code.into(),
            debit: Money::ZERO,
            credit: amount,
            description: Some(description.into()),
        }
    }
}

//-------------------------------------- RevenueRecognition    -------------------------------------------------------
/// The accounting record that an order's revenue has been earned (at delivery).
/// At most one exists per order; it is deleted again if the order is unwound in full.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RevenueRecognition {
    pub id: i64,
    pub order_id: OrderId,
    pub gross_revenue: Money,
    pub discount_amount: Money,
    pub net_revenue: Money,
    pub cogs_amount: Money,
    pub gross_profit: Money,
    pub revenue_entry_id: i64,
    pub cogs_entry_id: Option<i64>,
    pub recognized_by: String,
    pub recognized_at: DateTime<Utc>,
}

//-------------------------------------- FinancialPeriod       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    Open,
    Closing,
    Closed,
    Locked,
}

impl PeriodStatus {
    /// Closed and locked periods reject new postings dated inside them.
    pub fn blocks_postings(&self) -> bool {
        matches!(self, PeriodStatus::Closed | PeriodStatus::Locked)
    }
}

impl Display for PeriodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PeriodStatus::Open => "open",
            PeriodStatus::Closing => "closing",
            PeriodStatus::Closed => "closed",
            PeriodStatus::Locked => "locked",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct FinancialPeriod {
    pub id: i64,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub status: PeriodStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub reopened_at: Option<DateTime<Utc>>,
    pub reopened_by: Option<String>,
    pub reopen_reason: Option<String>,
}

//--------------------------------------      Audit log        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    /// JSON blob with change details.
    pub details: String,
    pub created_at: DateTime<Utc>,
}
