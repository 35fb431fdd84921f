use chrono::Duration;

use crate::{
    db_types::{JobId, NewOrder, Order, OrderId, Transaction},
    traits::{InsertOrderResult, SettlementDatabaseError},
};

#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Stores a new `Pending` order. If the `order_id` already exists, the existing order is returned and
    /// `inserted` is false.
    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, SettlementDatabaseError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementDatabaseError>;

    /// Locates the most relevant order that unlocks the given job. A `Paid` order is preferred, then the most recently
    /// created `Pending` order, then the most recent `Failed` one. There is no recency cutoff.
    async fn fetch_order_for_job(&self, job_id: &JobId) -> Result<Option<Order>, SettlementDatabaseError>;

    /// Records the gateway's identifier for the order. The identifier can be assigned once; repeating the same value
    /// is a no-op, but a different value is an error.
    async fn attach_gateway_order_id(
        &self,
        order_id: &OrderId,
        gateway_order_id: &str,
    ) -> Result<Order, SettlementDatabaseError>;

    async fn fetch_transactions_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<Transaction>, SettlementDatabaseError>;

    /// `Pending` orders older than `grace_period` that have a gateway reference, oldest first.
    async fn fetch_stale_pending_orders(
        &self,
        grace_period: Duration,
        limit: i64,
    ) -> Result<Vec<Order>, SettlementDatabaseError>;

    /// `Paid` orders whose referenced job still has `is_paid = false`, oldest first.
    async fn fetch_paid_orders_with_locked_jobs(&self, limit: i64) -> Result<Vec<Order>, SettlementDatabaseError>;
}
