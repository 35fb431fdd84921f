//! The reconciliation sweep: the backstop for every payment that no entry point saw through.
//!
//! A run has two passes.
//! 1. Stale `Pending` orders that have a gateway reference are re-verified against the gateway, oldest first.
//! 2. `Paid` orders whose job is still locked get the job unlock retried.
//!
//! Each run is bounded by a batch size and a time budget, and keeps no state between runs. Running it while entry
//! points resolve the same orders is safe.
use std::{
    fmt::Debug,
    time::{Duration, Instant},
};

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    cpe_api::{
        errors::SettlementError,
        settlement_api::SettlementApi,
        settlement_objects::{Decision, RejectReason, RetryReason},
    },
    traits::{PaymentGatewayClient, SettlementDatabase},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSettings {
    /// Orders younger than this are left alone; their customer may still be at the gateway.
    pub grace_period: chrono::Duration,
    /// Maximum number of orders examined per pass.
    pub batch_size: i64,
    /// Orders not reached within this budget are counted as deferred and picked up next run.
    pub time_budget: Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self { grace_period: chrono::Duration::minutes(2), batch_size: 50, time_budget: Duration::from_secs(50) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub settled: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errors: usize,
    pub healed: usize,
    pub deferred: usize,
    pub elapsed_ms: u64,
}

impl SweepSummary {
    pub fn is_empty(&self) -> bool {
        self.examined == 0 && self.healed == 0 && self.errors == 0 && self.deferred == 0
    }
}

pub struct ReconciliationApi<B, G> {
    settlement: SettlementApi<B, G>,
}

impl<B, G> Debug for ReconciliationApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B: Clone, G> Clone for ReconciliationApi<B, G> {
    fn clone(&self) -> Self {
        Self { settlement: self.settlement.clone() }
    }
}

impl<B, G> ReconciliationApi<B, G> {
    pub fn new(settlement: SettlementApi<B, G>) -> Self {
        Self { settlement }
    }
}

impl<B, G> ReconciliationApi<B, G>
where
    B: SettlementDatabase,
    G: PaymentGatewayClient,
{
    pub async fn run_sweep(&self, settings: SweepSettings) -> Result<SweepSummary, SettlementError> {
        let start = Instant::now();
        let mut summary = SweepSummary::default();
        let db = self.settlement.db();

        let stale = db.fetch_stale_pending_orders(settings.grace_period, settings.batch_size).await?;
        debug!("🕰️ {} stale pending orders to reconcile", stale.len());
        let total = stale.len();
        for (i, order) in stale.into_iter().enumerate() {
            if start.elapsed() >= settings.time_budget {
                summary.deferred += total - i;
                warn!("🕰️ Sweep time budget spent. {} pending orders deferred to the next run", total - i);
                break;
            }
            summary.examined += 1;
            let order_id = order.order_id.clone();
            match self.settlement.verify_with_gateway(order).await {
                Ok(Decision::Release(released)) => {
                    summary.settled += 1;
                    if released.unlock_deferred {
                        summary.errors += 1;
                    }
                },
                Ok(Decision::Rejected(RejectReason::PaymentFailed)) => summary.failed += 1,
                Ok(Decision::Rejected(RejectReason::NoPaymentFound)) => {
                    error!("🕰️ Order {order_id} vanished during reconciliation");
                    summary.errors += 1;
                },
                Ok(Decision::Retryable { reason: RetryReason::PaymentPending, .. }) => summary.still_pending += 1,
                Ok(Decision::Retryable { reason: RetryReason::VerificationError, .. }) => summary.errors += 1,
                Err(e) => {
                    error!("🕰️ Could not reconcile order {order_id}. {e}");
                    summary.errors += 1;
                },
            }
        }

        let locked = if start.elapsed() < settings.time_budget {
            db.fetch_paid_orders_with_locked_jobs(settings.batch_size).await?
        } else {
            Vec::new()
        };
        if !locked.is_empty() {
            info!("🕰️ {} paid orders still have a locked asset job", locked.len());
        }
        let total = locked.len();
        for (i, order) in locked.into_iter().enumerate() {
            if start.elapsed() >= settings.time_budget {
                summary.deferred += total - i;
                break;
            }
            let unlock = self.settlement.ensure_job_unlocked(&order).await;
            match unlock.job {
                Some(job) if job.is_paid && !unlock.deferred => {
                    info!("🕰️ Asset job {} for paid order {} is now unlocked", job.job_id, order.order_id);
                    summary.healed += 1;
                },
                _ => summary.errors += 1,
            }
        }

        summary.elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(summary)
    }
}
