//! Turning settlement decisions into responses.
//!
//! The engine decides whether an order is paid. Everything in here happens afterwards: choosing the retry hint a
//! polling client sees, and deciding whether a paid-for image can actually be handed out yet.
use std::time::Duration;

use colorize_payment_engine::{
    cpe_api::{
        retry::{BackoffPolicy, PollAdvice},
        settlement_objects::{RejectReason, ReleasedAsset, RetryReason},
    },
    db_types::{AssetJob, JobStatus},
    Decision,
};
use log::*;

use crate::{
    errors::{References, ServerError},
    integrations::asset_store::AssetStoreError,
};

/// Wait suggested while a paid job is still being processed, or its result is not in storage yet.
pub const PROCESSING_RETRY_HINT: Duration = Duration::from_secs(5);

/// How a resolution request is being made.
#[derive(Debug, Clone, Copy)]
pub struct Pacing<'a> {
    /// The number of times the client says it has already asked. `None` for one-off calls.
    pub attempt: Option<u32>,
    pub poll: &'a BackoffPolicy,
}

impl<'a> Pacing<'a> {
    pub fn once(poll: &'a BackoffPolicy) -> Self {
        Self { attempt: None, poll }
    }

    pub fn polling(attempt: Option<u32>, poll: &'a BackoffPolicy) -> Self {
        Self { attempt, poll }
    }

    /// The retry hint to hand out, or `None` if the client has asked too often and should contact support.
    pub fn retry_after(&self, suggested: Duration) -> Option<Duration> {
        match self.attempt {
            None => Some(suggested),
            Some(attempt) => match self.poll.advise(attempt, suggested) {
                PollAdvice::RetryAfter(d) => Some(d),
                PollAdvice::StopPolling => None,
            },
        }
    }

    fn transient<F>(&self, refs: References, suggested: Duration, f: F) -> ServerError
    where F: FnOnce(References, Duration) -> ServerError {
        match self.retry_after(suggested) {
            Some(retry_after) => f(refs, retry_after),
            None => {
                warn!("💻️ Client gave up after {:?} attempts. {refs:?} needs attention.", self.attempt);
                ServerError::ContactSupport(refs)
            },
        }
    }
}

/// Unwraps a release, or turns any other decision into the error the client sees.
pub fn released_or_error(
    decision: Decision,
    refs: References,
    pacing: Pacing<'_>,
) -> Result<ReleasedAsset, ServerError> {
    match decision {
        Decision::Release(released) => Ok(released),
        Decision::Rejected(RejectReason::NoPaymentFound) => Err(ServerError::NoPaymentFound(refs)),
        Decision::Rejected(RejectReason::PaymentFailed) => Err(ServerError::PaymentFailed(refs)),
        Decision::Retryable { reason: RetryReason::PaymentPending, retry_after } => {
            Err(pacing.transient(refs, retry_after, |refs, retry_after| ServerError::PaymentPending {
                refs,
                retry_after,
            }))
        },
        Decision::Retryable { reason: RetryReason::VerificationError, retry_after } => {
            Err(pacing.transient(refs, retry_after, |refs, retry_after| {
                ServerError::VerificationUnavailable { refs, retry_after }
            }))
        },
    }
}

/// The references of a released order, for error bodies.
pub fn references_for(released: &ReleasedAsset) -> References {
    References::new(released.order_id(), released.job_id())
}

/// The job a release hands out.
///
/// After a deferred unlock the job may not have been readable either. It is paid for, so that is a temporary gap and
/// the client is told to come back.
pub fn released_job<'r>(released: &'r ReleasedAsset, pacing: Pacing<'_>) -> Result<&'r AssetJob, ServerError> {
    let refs = references_for(released);
    match released.job.as_ref() {
        Some(job) => Ok(job),
        None if released.unlock_deferred => {
            warn!("💻️ The job for {refs:?} is paid for but could not be read");
            Err(pacing.transient(refs, PROCESSING_RETRY_HINT, |refs, retry_after| ServerError::AssetNotReady {
                refs,
                retry_after,
            }))
        },
        None => Err(ServerError::NoRecordFound(format!("Job for {refs:?}"))),
    }
}

/// Where the finished image of a paid job is stored.
///
/// A paid order does not mean the image exists: the job may still be running, or have failed.
pub fn result_location(job: &AssetJob, refs: References, pacing: Pacing<'_>) -> Result<String, ServerError> {
    match (job.status, job.result_url.as_ref()) {
        (JobStatus::Failed, _) => {
            warn!("💻️ Job {} was paid for but processing failed", job.job_id);
            Err(ServerError::ProcessingFailed(refs))
        },
        (JobStatus::Done, Some(url)) => Ok(url.clone()),
        (JobStatus::Done, None) => {
            warn!("💻️ Job {} is done but has no result location", job.job_id);
            Err(pacing.transient(refs, PROCESSING_RETRY_HINT, |refs, retry_after| ServerError::AssetNotReady {
                refs,
                retry_after,
            }))
        },
        (JobStatus::Pending | JobStatus::Processing, _) => {
            Err(pacing.transient(refs, PROCESSING_RETRY_HINT, |refs, retry_after| ServerError::Processing {
                refs,
                retry_after,
            }))
        },
    }
}

/// A missing object means the pipeline has not uploaded it yet. Anything else is a storage problem.
pub fn asset_store_error(e: AssetStoreError, refs: References) -> ServerError {
    match e {
        AssetStoreError::NotFound(location) => {
            debug!("💻️ Result for {refs:?} is not at {location} yet");
            ServerError::AssetNotReady { refs, retry_after: PROCESSING_RETRY_HINT }
        },
        AssetStoreError::Unavailable(msg) => ServerError::AssetStoreError(msg),
    }
}
