use cpg_common::PaymentObservation;
use thiserror::Error;

use crate::{
    db_types::{JobId, OrderId},
    traits::{FailOutcome, JobManagement, OrderManagement, SettlementResult},
};

#[derive(Debug, Clone, Error)]
pub enum SettlementDatabaseError {
    #[error("An error occurred with the database: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Asset job {0} does not exist")]
    JobNotFound(JobId),
    #[error("Order {0} has already failed and cannot be settled")]
    OrderAlreadyFailed(OrderId),
    #[error("Order {order_id} already has gateway order id {existing}")]
    GatewayOrderIdConflict { order_id: OrderId, existing: String },
    #[error("Database invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<sqlx::Error> for SettlementDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// The two atomic state transitions of the settlement engine.
///
/// Implementations must be safe when several callers (possibly on different instances) settle the same order at the
/// same time.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: OrderManagement + JobManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// In a single atomic transaction,
    /// * moves the order from `Pending` to `Paid`, recording the gateway's payment identifier and method, and
    /// * creates the SUCCESS transaction for the order, unless one already exists.
    ///
    /// Settling an order that is already `Paid` is a no-op that returns the existing transaction with
    /// `newly_settled = false`. Settling a `Failed` order returns [`SettlementDatabaseError::OrderAlreadyFailed`].
    ///
    /// The asset job flag is deliberately *not* part of this transaction.
    async fn settle_order(
        &self,
        order_id: &OrderId,
        observation: &PaymentObservation,
    ) -> Result<SettlementResult, SettlementDatabaseError>;

    /// Moves the order from `Pending` to `Failed`. A `Paid` order is left untouched and reported as
    /// [`FailOutcome::AlreadyPaid`].
    async fn mark_order_failed(
        &self,
        order_id: &OrderId,
        raw_state: &str,
    ) -> Result<FailOutcome, SettlementDatabaseError>;
}
