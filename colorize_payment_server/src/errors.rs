use std::time::Duration;

use actix_web::{
    error::ResponseError,
    http::{header, header::ContentType, StatusCode},
    HttpResponse,
};
use colorize_payment_engine::{
    db_types::{JobId, OrderId},
    AssetJobError,
    DecisionCode,
    OrderFlowError,
    SettlementError,
};
use log::error;
use serde::Serialize;
use thiserror::Error;

/// The identifiers a customer quotes when they contact support.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct References {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl References {
    pub fn new(order_id: Option<&OrderId>, job_id: Option<&JobId>) -> Self {
        Self { order_id: order_id.map(|o| o.as_str().to_string()), job_id: job_id.map(|j| j.as_str().to_string()) }
    }

    pub fn order(order_id: &OrderId) -> Self {
        Self::new(Some(order_id), None)
    }

    pub fn job(job_id: &JobId) -> Self {
        Self::new(None, Some(job_id))
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("Supply an order id, a job id, or both.")]
    MissingIdentifier,
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("The payment gateway could not create a checkout session. {0}")]
    CheckoutFailed(String),
    #[error("The asset could not be fetched from storage. {0}")]
    AssetStoreError(String),
    // --- Payment decisions that do not release the asset ---
    #[error("The payment has not been confirmed yet. Please wait and try again.")]
    PaymentPending { refs: References, retry_after: Duration },
    #[error("The payment failed. You can start a new checkout to try again.")]
    PaymentFailed(References),
    #[error("No payment was found for this image.")]
    NoPaymentFound(References),
    #[error("We could not reach the payment provider to confirm your payment. Please try again shortly.")]
    VerificationUnavailable { refs: References, retry_after: Duration },
    #[error("We could not confirm your payment yet. Please contact support and quote the reference ids.")]
    ContactSupport(References),
    #[error("The payment provider reported a different outcome for this order than we have on record. Please contact \
             support and quote the reference ids.")]
    ConflictingOutcome(References),
    // --- Paid, but the asset is not available ---
    #[error("Your payment is confirmed. The image is still being processed.")]
    Processing { refs: References, retry_after: Duration },
    #[error("Your payment is confirmed. The image is not ready for download yet.")]
    AssetNotReady { refs: References, retry_after: Duration },
    #[error("Your payment is confirmed, but processing the image failed. Please contact support.")]
    ProcessingFailed(References),
}

impl ServerError {
    /// The machine-readable code in the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PaymentPending { .. } => DecisionCode::PaymentPending.as_str(),
            Self::PaymentFailed(_) => DecisionCode::PaymentFailed.as_str(),
            Self::NoPaymentFound(_) => DecisionCode::NoPaymentFound.as_str(),
            Self::VerificationUnavailable { .. } => DecisionCode::VerificationError.as_str(),
            Self::ContactSupport(_) | Self::ConflictingOutcome(_) => DecisionCode::ContactSupport.as_str(),
            Self::Processing { .. } => DecisionCode::Processing.as_str(),
            Self::AssetNotReady { .. } => DecisionCode::AssetNotReady.as_str(),
            Self::ProcessingFailed(_) => DecisionCode::ProcessingFailed.as_str(),
            Self::InvalidRequestBody(_) | Self::InvalidRequestPath(_) | Self::MissingIdentifier => "BAD_REQUEST",
            Self::NoRecordFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::CheckoutFailed(_) => "CHECKOUT_FAILED",
            Self::AssetStoreError(_) => "ASSET_STORE_ERROR",
            Self::InitializeError(_)
            | Self::BackendError(_)
            | Self::IOError(_)
            | Self::ConfigurationError(_)
            | Self::Unspecified(_) => "INTERNAL_ERROR",
        }
    }

    /// How long the client should wait before asking again, for the transient variants.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::PaymentPending { retry_after, .. }
            | Self::VerificationUnavailable { retry_after, .. }
            | Self::Processing { retry_after, .. }
            | Self::AssetNotReady { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    pub fn references(&self) -> Option<&References> {
        match self {
            Self::PaymentPending { refs, .. }
            | Self::VerificationUnavailable { refs, .. }
            | Self::Processing { refs, .. }
            | Self::AssetNotReady { refs, .. }
            | Self::PaymentFailed(refs)
            | Self::NoPaymentFound(refs)
            | Self::ContactSupport(refs)
            | Self::ConflictingOutcome(refs)
            | Self::ProcessingFailed(refs) => Some(refs),
            _ => None,
        }
    }
}

/// Whole seconds, rounded up, and never zero.
pub fn retry_after_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
    #[serde(flatten)]
    refs: Option<&'a References>,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::MissingIdentifier => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::CheckoutFailed(_) => StatusCode::BAD_GATEWAY,
            Self::AssetStoreError(_) => StatusCode::BAD_GATEWAY,
            Self::PaymentPending { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
            Self::ContactSupport(_) => StatusCode::PAYMENT_REQUIRED,
            Self::NoPaymentFound(_) => StatusCode::NOT_FOUND,
            Self::VerificationUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::ConflictingOutcome(_) => StatusCode::CONFLICT,
            Self::Processing { .. } => StatusCode::ACCEPTED,
            Self::AssetNotReady { .. } => StatusCode::ACCEPTED,
            Self::ProcessingFailed(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let retry_after = self.retry_after().map(retry_after_secs);
        let body = ErrorBody {
            code: self.code(),
            error: self.to_string(),
            retry_after_secs: retry_after,
            refs: self.references(),
        };
        let mut res = HttpResponse::build(self.status_code());
        res.insert_header(ContentType::json());
        if let Some(secs) = retry_after {
            res.insert_header((header::RETRY_AFTER, secs.to_string()));
        }
        res.body(serde_json::to_string(&body).unwrap_or_else(|_| format!(r#"{{"code":"{}"}}"#, self.code())))
    }
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::ConflictingOutcome(order_id) => {
                error!("💻️ Order {order_id} has conflicting payment outcomes. It needs manual attention.");
                Self::ConflictingOutcome(References::order(&order_id))
            },
            SettlementError::DatabaseError(e) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::DatabaseError(e) => Self::BackendError(e.to_string()),
            OrderFlowError::OrderNotFound(_) | OrderFlowError::JobNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::JobAlreadyPaid(_) | OrderFlowError::GatewayOrderIdConflict { .. } => {
                Self::Conflict(e.to_string())
            },
            OrderFlowError::InvalidAmount => Self::InvalidRequestBody(e.to_string()),
        }
    }
}

impl From<AssetJobError> for ServerError {
    fn from(e: AssetJobError) -> Self {
        match e {
            AssetJobError::DatabaseError(e) => Self::BackendError(e.to_string()),
            AssetJobError::JobNotFound(_) => Self::NoRecordFound(e.to_string()),
            AssetJobError::StatusIsFinal(_) => Self::Conflict(e.to_string()),
        }
    }
}
