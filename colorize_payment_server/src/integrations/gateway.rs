use colorize_payment_engine::{
    db_types::{Order, OrderId},
    traits::{GatewayError, PaymentGatewayClient},
};
use cpg_common::PaymentObservation;
use gateway_tools::{CheckoutSession, CustomerDetails, GatewayApi, GatewayApiError, GatewayConfig};
use log::*;

/// Creates the gateway-side checkout for a freshly created order.
#[allow(async_fn_in_trait)]
pub trait CheckoutGateway {
    async fn create_checkout(
        &self,
        order: &Order,
        customer: CustomerDetails,
    ) -> Result<CheckoutSession, GatewayApiError>;
}

/// The payment gateway, as the engine and the checkout route see it.
#[derive(Clone)]
pub struct GatewayIntegration {
    api: GatewayApi,
}

impl GatewayIntegration {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let api = GatewayApi::new(config)?;
        Ok(Self { api })
    }
}

impl PaymentGatewayClient for GatewayIntegration {
    async fn query_status(&self, order_id: &OrderId) -> Result<PaymentObservation, GatewayError> {
        self.api.query_status(order_id.as_str()).await.map_err(to_gateway_error)
    }
}

impl CheckoutGateway for GatewayIntegration {
    async fn create_checkout(
        &self,
        order: &Order,
        customer: CustomerDetails,
    ) -> Result<CheckoutSession, GatewayApiError> {
        self.api.create_checkout(order.order_id.as_str(), order.amount, &order.currency, customer).await
    }
}

/// Transport failures, timeouts, throttling and 5xx answers may be retried. Everything else is a refusal.
pub fn to_gateway_error(e: GatewayApiError) -> GatewayError {
    if e.is_transient() {
        GatewayError::Unavailable(e.to_string())
    } else {
        debug!("🏦️ Gateway refused the status query. {e}");
        GatewayError::Rejected(e.to_string())
    }
}
