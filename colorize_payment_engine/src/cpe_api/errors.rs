use thiserror::Error;

use crate::{
    db_types::{JobId, OrderId},
    traits::SettlementDatabaseError,
};

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Database error: {0}")]
    DatabaseError(SettlementDatabaseError),
    /// The gateway reported the payment as completed, but the order had already been recorded as failed.
    #[error("Order {0} was recorded as failed, but the gateway now reports it as paid")]
    ConflictingOutcome(OrderId),
}

impl From<SettlementDatabaseError> for SettlementError {
    fn from(e: SettlementDatabaseError) -> Self {
        match e {
            SettlementDatabaseError::OrderAlreadyFailed(order_id) => Self::ConflictingOutcome(order_id),
            e => Self::DatabaseError(e),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(SettlementDatabaseError),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Asset job {0} does not exist")]
    JobNotFound(JobId),
    #[error("Asset job {0} has already been paid for")]
    JobAlreadyPaid(JobId),
    #[error("Order {order_id} is already linked to gateway order {existing}")]
    GatewayOrderIdConflict { order_id: OrderId, existing: String },
    #[error("Order amount must be positive")]
    InvalidAmount,
}

impl From<SettlementDatabaseError> for OrderFlowError {
    fn from(e: SettlementDatabaseError) -> Self {
        match e {
            SettlementDatabaseError::OrderNotFound(id) => Self::OrderNotFound(id),
            SettlementDatabaseError::JobNotFound(id) => Self::JobNotFound(id),
            SettlementDatabaseError::GatewayOrderIdConflict { order_id, existing } => {
                Self::GatewayOrderIdConflict { order_id, existing }
            },
            e => Self::DatabaseError(e),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AssetJobError {
    #[error("Database error: {0}")]
    DatabaseError(SettlementDatabaseError),
    #[error("Asset job {0} does not exist")]
    JobNotFound(JobId),
    #[error("Asset job {0} has already finished processing")]
    StatusIsFinal(JobId),
}

impl From<SettlementDatabaseError> for AssetJobError {
    fn from(e: SettlementDatabaseError) -> Self {
        match e {
            SettlementDatabaseError::JobNotFound(id) => Self::JobNotFound(id),
            e => Self::DatabaseError(e),
        }
    }
}
