use std::{fmt::Display, time::Duration};

use serde::{Deserialize, Serialize};

use crate::db_types::{AssetJob, JobId, Order, OrderId};

/// What the settlement engine tells an entry point to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The order is paid. The asset may be released.
    Release(ReleasedAsset),
    /// Terminal. Polling again will not change the answer.
    Rejected(RejectReason),
    /// Not decided yet. Ask again after `retry_after`.
    Retryable { reason: RetryReason, retry_after: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedAsset {
    /// The paid order. `None` for a job that a trusted caller unlocked without one.
    pub order: Option<Order>,
    /// The job the order unlocks, as last seen. `None` if the order does not reference a job, or the job could not
    /// be read back.
    pub job: Option<AssetJob>,
    /// True if the job's `is_paid` flag could not be written. The release still goes ahead; the reconciliation sweep
    /// will set the flag later.
    pub unlock_deferred: bool,
}

impl ReleasedAsset {
    pub fn order_id(&self) -> Option<&OrderId> {
        self.order.as_ref().map(|o| &o.order_id)
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.order.as_ref().and_then(|o| o.job_id.as_ref()).or_else(|| self.job.as_ref().map(|j| &j.job_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    NoPaymentFound,
    PaymentFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryReason {
    PaymentPending,
    VerificationError,
}

impl Decision {
    pub fn no_payment_found() -> Self {
        Self::Rejected(RejectReason::NoPaymentFound)
    }

    pub fn payment_failed() -> Self {
        Self::Rejected(RejectReason::PaymentFailed)
    }

    pub fn payment_pending(retry_after: Duration) -> Self {
        Self::Retryable { reason: RetryReason::PaymentPending, retry_after }
    }

    pub fn verification_error(retry_after: Duration) -> Self {
        Self::Retryable { reason: RetryReason::VerificationError, retry_after }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, Self::Release(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Retryable { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// The machine-readable code for this decision. Entry points may refine `PAID` into one of the asset codes once
    /// they have looked at the job.
    pub fn code(&self) -> DecisionCode {
        match self {
            Self::Release(_) => DecisionCode::Paid,
            Self::Rejected(RejectReason::NoPaymentFound) => DecisionCode::NoPaymentFound,
            Self::Rejected(RejectReason::PaymentFailed) => DecisionCode::PaymentFailed,
            Self::Retryable { reason: RetryReason::PaymentPending, .. } => DecisionCode::PaymentPending,
            Self::Retryable { reason: RetryReason::VerificationError, .. } => DecisionCode::VerificationError,
        }
    }
}

/// The codes clients see. They tell a client whether to keep polling, stop, or pay again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionCode {
    Paid,
    /// Paid, but the job is still being processed.
    Processing,
    /// Paid and processed, but the result is not in the asset store yet.
    AssetNotReady,
    PaymentPending,
    PaymentFailed,
    NoPaymentFound,
    VerificationError,
    /// The client has polled too often. A human needs to look at the order.
    ContactSupport,
    /// Paid, but the job itself failed.
    ProcessingFailed,
}

impl DecisionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "PAID",
            Self::Processing => "PROCESSING",
            Self::AssetNotReady => "ASSET_NOT_READY",
            Self::PaymentPending => "PAYMENT_PENDING",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::NoPaymentFound => "NO_PAYMENT_FOUND",
            Self::VerificationError => "VERIFICATION_ERROR",
            Self::ContactSupport => "CONTACT_SUPPORT",
            Self::ProcessingFailed => "PROCESSING_FAILED",
        }
    }

    /// Whether a client should stop polling on seeing this code.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing | Self::AssetNotReady | Self::PaymentPending | Self::VerificationError)
    }
}

impl Display for DecisionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
