use crate::db_types::{Order, Transaction};

#[derive(Debug, Clone)]
pub struct InsertOrderResult {
    pub order: Order,
    /// False if an order with the same `order_id` already existed. The stored order is returned unchanged.
    pub inserted: bool,
}

/// The outcome of the atomic settlement transaction.
#[derive(Debug, Clone)]
pub struct SettlementResult {
    /// The order, now `Paid`.
    pub order: Order,
    /// The one and only SUCCESS transaction for the order.
    pub transaction: Transaction,
    /// True only for the caller whose transaction created the SUCCESS record. Every other (concurrent or later)
    /// settlement of the same order is a no-op and sees `false`.
    pub newly_settled: bool,
}

#[derive(Debug, Clone)]
pub enum FailOutcome {
    /// The order is `Failed`. `newly_failed` is true if this call made the transition.
    Failed { order: Order, newly_failed: bool },
    /// The order had already been paid. Paid is sticky, so the failure observation was ignored.
    AlreadyPaid(Order),
}
