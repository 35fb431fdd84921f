//! Normalized view of the external payment gateway's payment state.
//!
//! The gateway reports a provider-defined state string. Everything downstream of the gateway client only ever sees
//! the tri-state [`GatewayOutcome`].
use std::fmt::Display;

use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayOutcome {
    /// The payment has been captured. Terminal.
    Completed,
    /// The payment failed, was cancelled or expired. Terminal.
    Failed,
    /// The gateway has not reached a terminal state yet.
    Pending,
}

impl GatewayOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for GatewayOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Pending => write!(f, "PENDING"),
        }
    }
}

/// A single status observation from the gateway. Transient; never persisted as its own record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentObservation {
    pub outcome: GatewayOutcome,
    /// The state string exactly as the gateway reported it.
    pub raw_state: String,
    /// The provider's identifier for the captured payment, if it reported one.
    pub provider_payment_id: Option<String>,
    /// The payment instrument (card, upi, wallet ...) if reported.
    pub payment_method: Option<String>,
}

impl PaymentObservation {
    pub fn new<S: Into<String>>(raw_state: S) -> Self {
        let raw_state = raw_state.into();
        let outcome = normalize_gateway_state(&raw_state);
        Self { outcome, raw_state, provider_payment_id: None, payment_method: None }
    }

    pub fn with_provider_payment_id<S: Into<String>>(mut self, id: S) -> Self {
        self.provider_payment_id = Some(id.into());
        self
    }

    pub fn with_payment_method<S: Into<String>>(mut self, method: S) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    pub fn completed() -> Self {
        Self::new("PAID")
    }

    pub fn failed() -> Self {
        Self::new("FAILED")
    }

    pub fn pending() -> Self {
        Self::new("ACTIVE")
    }
}

/// Maps a provider state string onto [`GatewayOutcome`]. Unknown values are treated as pending, never as success.
pub fn normalize_gateway_state(state: &str) -> GatewayOutcome {
    match state.trim().to_ascii_uppercase().as_str() {
        "PAID" | "COMPLETED" | "SUCCESS" | "CHARGED" => GatewayOutcome::Completed,
        "FAILED" | "EXPIRED" | "CANCELLED" | "TERMINATED" | "USER_DROPPED" | "VOID" => GatewayOutcome::Failed,
        "ACTIVE" | "PENDING" | "CREATED" | "NOT_ATTEMPTED" => GatewayOutcome::Pending,
        other => {
            warn!("🏦️ Unrecognised gateway state '{other}'. Treating it as PENDING.");
            GatewayOutcome::Pending
        },
    }
}
