//! The success-page polling loop as a pure state machine.
//!
//! A client that has just returned from the payment gateway polls the verify endpoint until it gets an answer it can
//! act on. [`PollingSession`] holds no timers and makes no calls: it is fed the [`DecisionCode`] of each response and
//! says what to show and how long to wait before polling again.
use std::{fmt::Display, time::Duration};

use serde::{Deserialize, Serialize};

use crate::cpe_api::{retry::BackoffPolicy, settlement_objects::DecisionCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    /// Waiting for the payment to be confirmed.
    Verifying,
    /// Paid. Waiting for the image to be ready.
    Processing,
    Succeeded,
    Failed,
    /// Too many attempts. The user is asked to contact support.
    GaveUp,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::GaveUp)
    }
}

impl Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollState::Verifying => write!(f, "Verifying"),
            PollState::Processing => write!(f, "Processing"),
            PollState::Succeeded => write!(f, "Succeeded"),
            PollState::Failed => write!(f, "Failed"),
            PollState::GaveUp => write!(f, "GaveUp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStep {
    pub state: PollState,
    /// How long to wait before the next poll. `None` once the session is over.
    pub wait: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct PollingSession {
    state: PollState,
    attempts: u32,
    policy: BackoffPolicy,
}

impl PollingSession {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { state: PollState::Verifying, attempts: 0, policy }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// The number of non-terminal answers seen so far. This is what the client sends back as `attempt`.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Feeds the code of the latest response into the session. Terminal states are sticky.
    pub fn advance(&mut self, code: DecisionCode) -> PollStep {
        if self.state.is_terminal() {
            return PollStep { state: self.state, wait: None };
        }
        let next = match code {
            DecisionCode::Paid => PollState::Succeeded,
            DecisionCode::Processing | DecisionCode::AssetNotReady => PollState::Processing,
            DecisionCode::PaymentPending | DecisionCode::VerificationError => PollState::Verifying,
            DecisionCode::PaymentFailed | DecisionCode::NoPaymentFound | DecisionCode::ProcessingFailed => {
                PollState::Failed
            },
            DecisionCode::ContactSupport => PollState::GaveUp,
        };
        if next.is_terminal() {
            self.state = next;
            return PollStep { state: next, wait: None };
        }
        let wait = self.policy.delay(self.attempts);
        self.attempts += 1;
        if self.policy.exhausted(self.attempts) {
            self.state = PollState::GaveUp;
            return PollStep { state: PollState::GaveUp, wait: None };
        }
        self.state = next;
        PollStep { state: next, wait: Some(wait) }
    }
}
