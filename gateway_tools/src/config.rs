use std::time::Duration;

use cpg_common::Secret;
use log::*;

const DEFAULT_GATEWAY_URL: &str = "https://sandbox.cashfree.com/pg";
const DEFAULT_API_VERSION: &str = "2023-08-01";
const DEFAULT_TIMEOUT_MS: u64 = 8_000;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API, without a trailing slash.
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub api_version: String,
    /// Upper bound on every request made to the gateway.
    pub timeout: Duration,
    /// Where the gateway sends the customer after checkout. `{order_id}` is substituted.
    pub return_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            client_id: String::default(),
            client_secret: Secret::default(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            return_url: None,
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("CPG_GATEWAY_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                warn!("🪛️ CPG_GATEWAY_URL not set, using the sandbox default {DEFAULT_GATEWAY_URL}");
                DEFAULT_GATEWAY_URL.to_string()
            });
        let client_id = std::env::var("CPG_GATEWAY_CLIENT_ID").unwrap_or_else(|_| {
            warn!("🪛️ CPG_GATEWAY_CLIENT_ID not set. Gateway calls will be rejected.");
            String::default()
        });
        let client_secret = Secret::new(std::env::var("CPG_GATEWAY_CLIENT_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ CPG_GATEWAY_CLIENT_SECRET not set. Gateway calls will be rejected.");
            String::default()
        }));
        let api_version = std::env::var("CPG_GATEWAY_API_VERSION").unwrap_or_else(|_| {
            info!("🪛️ CPG_GATEWAY_API_VERSION not set, using {DEFAULT_API_VERSION} as default");
            DEFAULT_API_VERSION.to_string()
        });
        let timeout = std::env::var("CPG_GATEWAY_TIMEOUT_MS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid value for CPG_GATEWAY_TIMEOUT_MS ({s}). {e}"))
                    .ok()
            })
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS));
        let return_url = std::env::var("CPG_GATEWAY_RETURN_URL").ok();
        Self { base_url, client_id, client_secret, api_version, timeout, return_url }
    }

    pub fn return_url_for(&self, order_id: &str) -> Option<String> {
        self.return_url.as_ref().map(|u| u.replace("{order_id}", order_id))
    }
}
