use serde::{Deserialize, Serialize};

use crate::db_types::{
    FinancialPeriod, Money, Order, OrderItem, OrderStatusHistory, OrderStatusType,
};

/// The result of a status transition: the updated order plus where it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderChange {
    pub previous_status: OrderStatusType,
    pub order: Order,
}

/// An order with its line items and full transition history. Admin read model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub history: Vec<OrderStatusHistory>,
}

/// Page request for order listings. Pages are 1-based.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page: page.max(1), limit: limit.clamp(1, 100) }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// One page of orders plus the total row count for the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderListing {
    pub orders: Vec<Order>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl OrderListing {
    pub fn total_pages(&self) -> i64 {
        if self.limit == 0 {
            0
        } else {
            (self.total + self.limit - 1) / self.limit
        }
    }
}

/// Outcome of one sweeper run. Failures are per-row and already logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SweepResult {
    pub processed: usize,
    pub failed: usize,
}

/// What an operator sees before sealing a financial period. Advisory only; nothing here
/// blocks the close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodClosePreview {
    pub period: FinancialPeriod,
    pub journal_entries: i64,
    pub total_debits: Money,
    pub total_credits: Money,
    pub pending_orders: i64,
    pub warnings: Vec<String>,
}

/// Sum of all debits vs all credits across the journal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrialBalance {
    pub total_debits: Money,
    pub total_credits: Money,
}

impl TrialBalance {
    pub fn variance(&self) -> Money {
        (self.total_debits - self.total_credits).abs()
    }

    pub fn is_balanced(&self) -> bool {
        self.variance() <= Money::EPSILON
    }
}
