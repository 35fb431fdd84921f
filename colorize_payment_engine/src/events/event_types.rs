use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Transaction};

/// Published exactly once per order: by whichever caller's transaction created the SUCCESS record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub transaction: Transaction,
}

impl OrderPaidEvent {
    pub fn new(order: Order, transaction: Transaction) -> Self {
        Self { order, transaction }
    }
}

/// Published when an order moves from `Pending` to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFailedEvent {
    pub order: Order,
    /// The gateway state that caused the failure, e.g. `EXPIRED`.
    pub gateway_state: String,
}

impl OrderFailedEvent {
    pub fn new<S: Into<String>>(order: Order, gateway_state: S) -> Self {
        Self { order, gateway_state: gateway_state.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderPaid(OrderPaidEvent),
    OrderFailed(OrderFailedEvent),
}
