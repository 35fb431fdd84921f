//! The settlement engine.
//!
//! [`SettlementApi::resolve`] is the one place that decides whether an order is paid. Every entry point (the asset
//! download, the success-page verifier, the untrusted mark-paid call and the reconciliation sweep) asks it, and only
//! translates the [`Decision`] it gets back.
//!
//! The engine trusts three sources, in this order:
//! 1. the stored order. `Paid` and `Failed` are final, whatever anyone else says later.
//! 2. the status cache, but only for terminal outcomes, and a cached `COMPLETED` is only trusted once the database
//!    agrees.
//! 3. the payment gateway, queried with a bounded number of retries.
//!
//! Once the gateway reports `COMPLETED`, the order is settled in one database transaction. The asset job is unlocked
//! afterwards as a separate, retried step. If that step fails, the customer still gets the asset and the
//! reconciliation sweep sets the flag later.
use std::{fmt::Debug, sync::Arc};

use backon::Retryable;
use cpg_common::{GatewayOutcome, PaymentObservation};
use log::*;

use crate::{
    cpe_api::{
        errors::SettlementError,
        retry::SettlementPolicy,
        settlement_objects::{Decision, ReleasedAsset},
    },
    db_types::{AssetJob, JobId, Order, OrderId, OrderStatusType},
    events::{EventProducers, OrderFailedEvent, OrderPaidEvent},
    traits::{FailOutcome, GatewayError, PaymentGatewayClient, SettlementDatabase, SettlementDatabaseError, StatusCache},
};

/// The result of trying to set a job's `is_paid` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUnlock {
    pub job: Option<AssetJob>,
    /// The flag could not be written, even after retries.
    pub deferred: bool,
}

pub struct SettlementApi<B, G> {
    db: B,
    gateway: Arc<G>,
    cache: Arc<dyn StatusCache>,
    producers: EventProducers,
    policy: SettlementPolicy,
}

impl<B, G> Debug for SettlementApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi ({:?})", self.policy)
    }
}

impl<B: Clone, G> Clone for SettlementApi<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            gateway: Arc::clone(&self.gateway),
            cache: Arc::clone(&self.cache),
            producers: self.producers.clone(),
            policy: self.policy,
        }
    }
}

impl<B, G> SettlementApi<B, G> {
    pub fn new(db: B, gateway: G, cache: Arc<dyn StatusCache>, producers: EventProducers) -> Self {
        Self { db, gateway: Arc::new(gateway), cache, producers, policy: SettlementPolicy::default() }
    }

    pub fn with_policy(mut self, policy: SettlementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &SettlementPolicy {
        &self.policy
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> SettlementApi<B, G>
where
    B: SettlementDatabase,
    G: PaymentGatewayClient,
{
    /// Decides whether the asset behind an order (or a job) may be released.
    ///
    /// If `order_id` is given, that order is used. Otherwise the most relevant order for `job_id` is located: a paid
    /// order first, then the newest pending one. When both are given, the order must reference the job; a paid order
    /// never unlocks an unrelated job.
    ///
    /// A job looked up on its own, with no order at all, is released if its `is_paid` flag is already set. That is
    /// how jobs unlocked by a trusted caller are handed out.
    pub async fn resolve(
        &self,
        order_id: Option<&OrderId>,
        job_id: Option<&JobId>,
    ) -> Result<Decision, SettlementError> {
        let order = match (order_id, job_id) {
            (Some(order_id), _) => self.db.fetch_order_by_order_id(order_id).await?,
            (None, Some(job_id)) => self.db.fetch_order_for_job(job_id).await?,
            (None, None) => None,
        };
        let Some(order) = order else {
            if let (None, Some(job_id)) = (order_id, job_id) {
                if let Some(job) = self.db.fetch_job(job_id).await?.filter(|j| j.is_paid) {
                    debug!("🧾️ Job {job_id} has no order, but it has been unlocked. Releasing it.");
                    return Ok(Decision::Release(ReleasedAsset { order: None, job: Some(job), unlock_deferred: false }));
                }
            }
            debug!("🧾️ No order found for order {order_id:?} / job {job_id:?}");
            return Ok(Decision::no_payment_found());
        };
        if let (Some(_), Some(job_id)) = (order_id, job_id) {
            if !order.references_job(job_id) {
                warn!(
                    "🧾️ Order {} references job {:?}, not job {job_id}. Treating as no payment found.",
                    order.order_id, order.job_id
                );
                return Ok(Decision::no_payment_found());
            }
        }
        self.resolve_order(order).await
    }

    /// Resolves an order that has already been loaded.
    pub async fn resolve_order(&self, order: Order) -> Result<Decision, SettlementError> {
        match order.status {
            OrderStatusType::Paid => {
                trace!("🧾️ Order {} is already paid", order.order_id);
                Ok(self.release(order).await)
            },
            OrderStatusType::Failed => Ok(Decision::payment_failed()),
            OrderStatusType::Pending => self.resolve_pending(order).await,
        }
    }

    async fn resolve_pending(&self, order: Order) -> Result<Decision, SettlementError> {
        let order_id = order.order_id.clone();
        match self.cache.get(&order_id) {
            Some(observation) if observation.outcome == GatewayOutcome::Completed => {
                // Another caller may still be writing. Only the database can confirm the settlement landed.
                let stored = self
                    .db
                    .fetch_order_by_order_id(&order_id)
                    .await?
                    .ok_or_else(|| SettlementDatabaseError::OrderNotFound(order_id.clone()))?;
                if stored.status == OrderStatusType::Paid {
                    trace!("🧊️ Cached COMPLETED for {order_id} is confirmed by the database");
                    return Ok(self.release(stored).await);
                }
                debug!("🧊️ Cached COMPLETED for {order_id} is not in the database yet. Asking the gateway.");
                self.cache.expire(&order_id);
            },
            Some(observation) if observation.outcome == GatewayOutcome::Failed => {
                trace!("🧊️ Cached FAILED for {order_id}");
                return self.apply_failed(order, &observation).await;
            },
            _ => {},
        }
        self.verify_with_gateway(order).await
    }

    /// Asks the gateway about the order and acts on the answer, bypassing the status cache.
    ///
    /// This is what the reconciliation sweep runs for each stale order.
    pub async fn verify_with_gateway(&self, order: Order) -> Result<Decision, SettlementError> {
        let order_id = order.order_id.clone();
        let observation = match self.query_with_retries(&order_id).await {
            Ok(observation) => observation,
            Err(e) => {
                error!("🧾️ Could not verify payment for order {order_id}. {e}");
                return Ok(Decision::verification_error(self.policy.verification_retry_hint));
            },
        };
        match observation.outcome {
            GatewayOutcome::Completed => {
                let released = self.settle(&order_id, &observation).await?;
                self.cache.put(&order_id, observation, self.policy.terminal_cache_ttl);
                Ok(released)
            },
            GatewayOutcome::Failed => {
                self.cache.put(&order_id, observation.clone(), self.policy.terminal_cache_ttl);
                self.apply_failed(order, &observation).await
            },
            GatewayOutcome::Pending => {
                debug!("🧾️ Payment for order {order_id} is still pending ({})", observation.raw_state);
                Ok(Decision::payment_pending(self.policy.pending_retry_hint))
            },
        }
    }

    /// Runs the atomic settlement and then unlocks the job. Publishes [`OrderPaidEvent`] only if this call created
    /// the SUCCESS transaction.
    async fn settle(&self, order_id: &OrderId, observation: &PaymentObservation) -> Result<Decision, SettlementError> {
        let result = self.db.settle_order(order_id, observation).await.map_err(|e| {
            if let SettlementDatabaseError::OrderAlreadyFailed(_) = &e {
                error!(
                    "🧾️ The gateway reports order {order_id} as {}, but it has already been recorded as failed. \
                     This order needs manual attention.",
                    observation.raw_state
                );
            }
            SettlementError::from(e)
        })?;
        if result.newly_settled {
            info!(
                "🧾️ Order {order_id} is PAID. {} {} (payment ref {:?})",
                result.order.amount, result.order.currency, result.transaction.provider_payment_id
            );
            let event = OrderPaidEvent::new(result.order.clone(), result.transaction.clone());
            self.producers.publish_order_paid(event).await;
        } else {
            debug!("🧾️ Order {order_id} was already settled by another caller");
        }
        Ok(self.release(result.order).await)
    }

    async fn apply_failed(&self, order: Order, observation: &PaymentObservation) -> Result<Decision, SettlementError> {
        let order_id = order.order_id.clone();
        match self.db.mark_order_failed(&order_id, &observation.raw_state).await? {
            FailOutcome::Failed { order, newly_failed } => {
                if newly_failed {
                    info!("🧾️ Order {order_id} is FAILED ({})", observation.raw_state);
                    let event = OrderFailedEvent::new(order, observation.raw_state.clone());
                    self.producers.publish_order_failed(event).await;
                }
                Ok(Decision::payment_failed())
            },
            FailOutcome::AlreadyPaid(order) => {
                warn!(
                    "🧾️ Ignoring a {} observation for order {order_id}, which has already been paid",
                    observation.raw_state
                );
                self.cache.expire(&order_id);
                Ok(self.release(order).await)
            },
        }
    }

    async fn release(&self, order: Order) -> Decision {
        let unlock = self.ensure_job_unlocked(&order).await;
        Decision::Release(ReleasedAsset { order: Some(order), job: unlock.job, unlock_deferred: unlock.deferred })
    }

    /// Sets `is_paid` on the job a paid order references, retrying a few times. Never fails: a write that cannot be
    /// made is reported as deferred and left for the reconciliation sweep.
    pub async fn ensure_job_unlocked(&self, order: &Order) -> JobUnlock {
        let Some(job_id) = order.job_id.as_ref() else {
            return JobUnlock { job: None, deferred: false };
        };
        if let Ok(Some(job)) = self.db.fetch_job(job_id).await {
            if job.is_paid {
                return JobUnlock { job: Some(job), deferred: false };
            }
        }
        let unlock = (|| async { self.db.mark_job_paid(job_id).await })
            .retry(self.policy.job_flag_retry)
            .when(|e| !matches!(e, SettlementDatabaseError::JobNotFound(_)))
            .notify(|e, wait| warn!("🧾️ Unlocking asset job {job_id} failed. {e}. Retrying in {}ms", wait.as_millis()))
            .await;
        match unlock {
            Ok(job) => {
                debug!("🧾️ Asset job {job_id} unlocked by order {}", order.order_id);
                JobUnlock { job: Some(job), deferred: false }
            },
            Err(SettlementDatabaseError::JobNotFound(_)) => {
                error!("🧾️ Order {} references asset job {job_id}, which does not exist", order.order_id);
                JobUnlock { job: None, deferred: false }
            },
            Err(e) => {
                warn!("🧾️ Could not unlock asset job {job_id}. {e}. The reconciliation sweep will retry.");
                let job = match self.db.fetch_job(job_id).await {
                    Ok(job) => job,
                    Err(e) => {
                        warn!("🧾️ Could not read asset job {job_id} back either. {e}");
                        None
                    },
                };
                JobUnlock { job, deferred: true }
            },
        }
    }

    async fn query_with_retries(&self, order_id: &OrderId) -> Result<PaymentObservation, GatewayError> {
        let timeout = self.policy.gateway_timeout;
        let observation = (|| async {
            match tokio::time::timeout(timeout, self.gateway.query_status(order_id)).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Unavailable(format!("no answer within {}ms", timeout.as_millis()))),
            }
        })
        .retry(self.policy.gateway_retry)
        .when(GatewayError::is_transient)
        .notify(|e, wait| warn!("🏦️ Gateway query for {order_id} failed. {e}. Retrying in {}ms", wait.as_millis()))
        .await?;
        trace!("🏦️ Gateway reports {} for order {order_id}", observation.raw_state);
        Ok(observation)
    }
}
