//! Backoff schedules.
//!
//! Server-side retries (gateway queries and the job flag write) are driven by `backon` builders held in
//! [`SettlementPolicy`]. [`BackoffPolicy`] is only used to pace clients that poll: it answers how long a client should
//! wait before asking again, and when it should stop. Delays double from `base` and never exceed `cap`, so a sequence
//! of delays is always non-decreasing.
use std::time::Duration;

use backon::{ConstantBuilder, ExponentialBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn exponential(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self { base, cap, max_attempts }
    }

    /// The same delay every time.
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self { base: delay, cap: delay, max_attempts }
    }

    /// `min(base * 2^attempt, cap)`. `attempt` counts from zero.
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt).and_then(|factor| self.base.checked_mul(factor)).map_or(self.cap, |d| d.min(self.cap))
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }

    /// Advice for a client that has already polled `attempt` times. The wait is never shorter than `suggested`.
    pub fn advise(&self, attempt: u32, suggested: Duration) -> PollAdvice {
        if self.exhausted(attempt) {
            PollAdvice::StopPolling
        } else {
            PollAdvice::RetryAfter(self.delay(attempt).max(suggested))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAdvice {
    RetryAfter(Duration),
    /// Stop and tell the user to contact support.
    StopPolling,
}

/// The timings the settlement engine works with.
#[derive(Debug, Clone, Copy)]
pub struct SettlementPolicy {
    /// Retries of a gateway status query that failed for a transient reason. `max_times` counts retries, not
    /// calls.
    pub gateway_retry: ExponentialBuilder,
    /// Retries of the asset job `is_paid` write.
    pub job_flag_retry: ConstantBuilder,
    /// Upper bound on a single gateway call, whatever the client's own timeout is.
    pub gateway_timeout: Duration,
    /// Suggested wait when the gateway still reports the payment as pending.
    pub pending_retry_hint: Duration,
    /// Suggested wait when the gateway could not be reached.
    pub verification_retry_hint: Duration,
    /// How long terminal gateway observations stay in the status cache.
    pub terminal_cache_ttl: Duration,
    /// The client polling schedule.
    pub poll: BackoffPolicy,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            gateway_retry: ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(4))
                .with_max_times(2),
            job_flag_retry: ConstantBuilder::default().with_delay(Duration::from_millis(250)).with_max_times(2),
            gateway_timeout: Duration::from_secs(10),
            pending_retry_hint: Duration::from_secs(5),
            verification_retry_hint: Duration::from_secs(10),
            terminal_cache_ttl: Duration::from_secs(300),
            poll: BackoffPolicy::exponential(Duration::from_secs(2), Duration::from_secs(30), 10),
        }
    }
}

impl SettlementPolicy {
    pub fn with_terminal_cache_ttl(mut self, ttl: Duration) -> Self {
        self.terminal_cache_ttl = ttl;
        self
    }

    pub fn with_max_poll_attempts(mut self, max_attempts: u32) -> Self {
        self.poll.max_attempts = max_attempts;
        self
    }

    /// Shrinks every retry wait to a millisecond. The number of retries is unchanged. Handy in tests.
    pub fn without_delays(mut self) -> Self {
        let tick = Duration::from_millis(1);
        self.gateway_retry = self.gateway_retry.with_min_delay(tick).with_max_delay(tick);
        self.job_flag_retry = self.job_flag_retry.with_delay(tick);
        self
    }
}
