use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType};

/// Fired after a payment confirmation commits: the order is paid and its stock committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Fired after an order leaves the live flow without being fulfilled — cancelled by a
/// person, a payment failure, or a sweeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

/// Fired after the delivery transition commits, once revenue has been recognized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDeliveredEvent {
    pub order: Order,
}

impl OrderDeliveredEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}
