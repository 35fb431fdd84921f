use std::collections::HashMap;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomerDetails {
    pub customer_id: String,
    pub customer_phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OrderMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CheckoutRequest {
    pub order_id: String,
    /// Major units, as the gateway expects.
    pub order_amount: f64,
    pub order_currency: String,
    pub customer_details: CustomerDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_meta: Option<OrderMeta>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub order_tags: HashMap<String, String>,
}

/// The gateway's response to a checkout request. `payment_session_id` is handed to the client-side checkout widget.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSession {
    #[serde(deserialize_with = "string_or_number")]
    pub cf_order_id: String,
    pub order_id: String,
    pub order_status: String,
    pub payment_session_id: String,
}

/// The gateway's view of an order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayOrder {
    #[serde(deserialize_with = "string_or_number")]
    pub cf_order_id: String,
    pub order_id: String,
    pub order_status: String,
    #[serde(default)]
    pub order_amount: Option<f64>,
    #[serde(default)]
    pub order_currency: Option<String>,
    #[serde(default)]
    pub payment: Option<GatewayPayment>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayPayment {
    #[serde(deserialize_with = "string_or_number")]
    pub cf_payment_id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_group: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected a string or number, got {other}"))),
    }
}
