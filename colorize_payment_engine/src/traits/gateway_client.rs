use cpg_common::PaymentObservation;
use thiserror::Error;

use crate::db_types::OrderId;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Transport failure, timeout or 5xx. Worth retrying.
    #[error("The payment gateway is unavailable. {0}")]
    Unavailable(String),
    /// The gateway answered, but refused the query. Retrying will not help.
    #[error("The payment gateway rejected the status query. {0}")]
    Rejected(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// One authoritative status query against the external payment gateway.
///
/// Implementations must perform exactly one network call with a bounded timeout, must not retry, and must never
/// invent a status: a failed call is an error, not a `Pending` or `Failed` observation.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayClient {
    async fn query_status(&self, order_id: &OrderId) -> Result<PaymentObservation, GatewayError>;
}
