use std::sync::Arc;

use cpg_common::{MinorUnits, PaymentObservation};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::GatewayConfig,
    data_objects::{CheckoutRequest, CheckoutSession, CustomerDetails, GatewayOrder, OrderMeta},
    helpers::gateway_amount,
    GatewayApiError,
};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(4);
        let client_id = HeaderValue::from_str(config.client_id.as_str())
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        let mut client_secret = HeaderValue::from_str(config.client_secret.reveal().as_str())
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        client_secret.set_sensitive(true);
        let api_version = HeaderValue::from_str(config.api_version.as_str())
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert("x-client-id", client_id);
        headers.insert("x-client-secret", client_secret);
        headers.insert("x-api-version", api_version);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("🏦️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            trace!("🏦️ REST query successful. {status}");
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let message = response.text().await.map_err(|e| self.transport_error(e))?;
            if status == StatusCode::NOT_FOUND {
                return Err(GatewayApiError::OrderNotFound(format!("{path}: {message}")));
            }
            Err(GatewayApiError::QueryError { status: status.as_u16(), message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Performs exactly one status query against the gateway for the application's `order_id`.
    ///
    /// The raw state is normalized with [`cpg_common::normalize_gateway_state`]. Any transport error or non-success
    /// response is returned as an error.
    pub async fn query_status(&self, order_id: &str) -> Result<PaymentObservation, GatewayApiError> {
        let path = format!("/orders/{order_id}");
        debug!("🏦️ Querying payment status for order {order_id}");
        let order = self.rest_query::<GatewayOrder, ()>(Method::GET, &path, None).await?;
        let mut observation = PaymentObservation::new(order.order_status.as_str());
        if let Some(payment) = order.payment {
            observation = observation.with_provider_payment_id(payment.cf_payment_id);
            if let Some(method) = payment.payment_group {
                observation = observation.with_payment_method(method);
            }
        }
        debug!("🏦️ Order {order_id} is {} at the gateway ({})", observation.outcome, observation.raw_state);
        Ok(observation)
    }

    /// Creates a checkout session for a new order.
    pub async fn create_checkout(
        &self,
        order_id: &str,
        amount: MinorUnits,
        currency: &str,
        customer: CustomerDetails,
    ) -> Result<CheckoutSession, GatewayApiError> {
        let order_meta = self.config.return_url_for(order_id).map(|u| OrderMeta { return_url: Some(u) });
        let request = CheckoutRequest {
            order_id: order_id.to_string(),
            order_amount: gateway_amount(amount),
            order_currency: currency.to_string(),
            customer_details: customer,
            order_meta,
            ..Default::default()
        };
        debug!("🏦️ Creating checkout session for order {order_id} ({amount} {currency})");
        let session = self.rest_query::<CheckoutSession, _>(Method::POST, "/orders", Some(request)).await?;
        info!("🏦️ Checkout session created for order {order_id}. Gateway order id: {}", session.cf_order_id);
        Ok(session)
    }

    fn transport_error(&self, e: reqwest::Error) -> GatewayApiError {
        if e.is_timeout() {
            #[allow(clippy::cast_possible_truncation)]
            GatewayApiError::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            GatewayApiError::Transport(e.to_string())
        }
    }
}
