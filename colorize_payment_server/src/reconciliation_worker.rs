use std::time::Duration;

use colorize_payment_engine::{PaymentGatewayClient, ReconciliationApi, SettlementDatabase, SweepSettings};
use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Must be called from within the server's runtime: the worker runs on the current thread's local task set.
///
/// The first sweep runs one `interval` after start-up. A sweep that overruns the interval delays the next one rather
/// than stacking up behind it.
pub fn start_reconciliation_worker<B, G>(
    api: ReconciliationApi<B, G>,
    interval: Duration,
    settings: SweepSettings,
) -> JoinHandle<()>
where
    B: SettlementDatabase + 'static,
    G: PaymentGatewayClient + 'static,
{
    tokio::task::spawn_local(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut timer = tokio::time::interval_at(start, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🕰️ Reconciliation worker started. Sweeping every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running reconciliation sweep");
            match api.run_sweep(settings).await {
                Ok(summary) if summary.is_empty() => debug!("🕰️ Nothing to reconcile"),
                Ok(summary) => {
                    info!(
                        "🕰️ Sweep examined {} orders in {}ms: {} settled, {} failed, {} still pending, {} healed",
                        summary.examined,
                        summary.elapsed_ms,
                        summary.settled,
                        summary.failed,
                        summary.still_pending,
                        summary.healed
                    );
                    if summary.errors > 0 {
                        warn!("🕰️ {} orders could not be reconciled. They are retried next sweep", summary.errors);
                    }
                    if summary.deferred > 0 {
                        warn!("🕰️ The sweep ran out of time. {} orders were deferred", summary.deferred);
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running reconciliation sweep: {e}");
                },
            }
        }
    })
}
