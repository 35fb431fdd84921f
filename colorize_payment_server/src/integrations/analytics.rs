//! Conversion tracking.
//!
//! When an order is paid for the first time, its tracking sub-document (click ids, user agent, client IP) is posted
//! to the analytics endpoint. This runs on the engine's event handler task: a slow or failing analytics endpoint is
//! logged and otherwise ignored.
use std::{env, time::Duration};

use chrono::{DateTime, Utc};
use colorize_payment_engine::{
    db_types::{TrackingInfo, TransactionType},
    events::{EventHandlers, EventHooks, OrderPaidEvent},
};
use cpg_common::Secret;
use futures::future::BoxFuture;
use log::*;
use serde::Serialize;
use thiserror::Error;

pub const ANALYTICS_EVENT_BUFFER_SIZE: usize = 25;
const DEFAULT_ANALYTICS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Error)]
pub enum AnalyticsError {
    #[error("Could not initialize the analytics client. {0}")]
    Initialization(String),
    #[error("Could not deliver the conversion. {0}")]
    Delivery(String),
}

#[derive(Clone, Debug)]
pub struct AnalyticsConfig {
    /// Conversion events are only sent if this is set.
    pub url: Option<String>,
    pub api_key: Secret<String>,
    pub timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self { url: None, api_key: Secret::default(), timeout: DEFAULT_ANALYTICS_TIMEOUT }
    }
}

impl AnalyticsConfig {
    pub fn from_env_or_default() -> Self {
        let url = env::var("CPG_ANALYTICS_URL").ok().filter(|s| !s.trim().is_empty());
        if url.is_none() {
            info!("🪛️ CPG_ANALYTICS_URL is not set. Conversion tracking is disabled.");
        }
        let api_key = Secret::new(env::var("CPG_ANALYTICS_API_KEY").unwrap_or_default());
        Self { url, api_key, timeout: DEFAULT_ANALYTICS_TIMEOUT }
    }
}

/// What the analytics endpoint receives for each paid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionPayload {
    pub event: &'static str,
    pub order_id: String,
    pub transaction_id: Option<String>,
    /// Major units, e.g. "79.00"
    pub value: String,
    pub amount_minor: i64,
    pub currency: String,
    pub tx_type: TransactionType,
    pub user_id: Option<String>,
    pub tracking: Option<TrackingInfo>,
    pub paid_at: DateTime<Utc>,
}

impl From<&OrderPaidEvent> for ConversionPayload {
    fn from(ev: &OrderPaidEvent) -> Self {
        let order = &ev.order;
        Self {
            event: "purchase",
            order_id: order.order_id.as_str().to_string(),
            transaction_id: ev.transaction.provider_payment_id.clone(),
            value: order.amount.to_string(),
            amount_minor: order.amount.value(),
            currency: order.currency.clone(),
            tx_type: ev.transaction.tx_type,
            user_id: order.user_id.clone(),
            tracking: order.tracking().cloned(),
            paid_at: ev.transaction.created_at,
        }
    }
}

#[derive(Clone)]
pub struct AnalyticsClient {
    url: String,
    api_key: Secret<String>,
    client: reqwest::Client,
}

impl AnalyticsClient {
    pub fn new(url: &str, config: &AnalyticsConfig) -> Result<Self, AnalyticsError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalyticsError::Initialization(e.to_string()))?;
        Ok(Self { url: url.to_string(), api_key: config.api_key.clone(), client })
    }

    pub async fn send_conversion(&self, payload: &ConversionPayload) -> Result<(), AnalyticsError> {
        let mut req = self.client.post(&self.url).json(payload);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(self.api_key.reveal());
        }
        let res = req.send().await.map_err(|e| AnalyticsError::Delivery(e.to_string()))?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(AnalyticsError::Delivery(format!("status {}", res.status())))
        }
    }
}

/// Creates the conversion-tracking event handlers, or `None` if no analytics endpoint is configured.
pub fn create_analytics_event_handlers(config: &AnalyticsConfig) -> Result<Option<EventHandlers>, AnalyticsError> {
    let Some(url) = config.url.as_deref() else {
        return Ok(None);
    };
    let client = AnalyticsClient::new(url, config)?;
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(move |ev| -> BoxFuture<'static, ()> {
        let payload = ConversionPayload::from(&ev);
        let client = client.clone();
        Box::pin(async move {
            if payload.tracking.as_ref().map_or(true, |t| !t.has_attribution()) {
                debug!("📬️ Order {} has no click attribution. Sending the conversion anyway.", payload.order_id);
            }
            match client.send_conversion(&payload).await {
                Ok(()) => info!("📬️ Conversion for order {} sent to analytics", payload.order_id),
                Err(e) => warn!("📬️ Conversion for order {} was not recorded. {e}", payload.order_id),
            }
        })
    });
    Ok(Some(EventHandlers::new(ANALYTICS_EVENT_BUFFER_SIZE, hooks)))
}
