use std::str::FromStr;

use colorize_payment_engine::{
    db_types::{JobId, OrderId, OrderStatusType},
    JobManagement,
    OrderManagement,
    ReconciliationApi,
    SweepSettings,
};
use cucumber::{then, when};
use futures_util::future::join_all;

use crate::cucumber::SettlementWorld;

#[when(expr = "I resolve order {word} for job {word}")]
async fn resolve_order_and_job(world: &mut SettlementWorld, order_id: String, job_id: String) {
    let decision = world
        .system()
        .api
        .resolve(Some(&OrderId::from(order_id)), Some(&JobId::from(job_id)))
        .await
        .expect("Error resolving order");
    world.decisions.push(decision);
}

#[when(expr = "I resolve order {word}")]
async fn resolve_order(world: &mut SettlementWorld, order_id: String) {
    let decision =
        world.system().api.resolve(Some(&OrderId::from(order_id)), None).await.expect("Error resolving order");
    world.decisions.push(decision);
}

#[when(expr = "I resolve job {word}")]
async fn resolve_job(world: &mut SettlementWorld, job_id: String) {
    let decision = world.system().api.resolve(None, Some(&JobId::from(job_id))).await.expect("Error resolving job");
    world.decisions.push(decision);
}

#[when(expr = "{int} callers resolve order {word} for job {word} at the same time")]
async fn resolve_concurrently(world: &mut SettlementWorld, n: usize, order_id: String, job_id: String) {
    let order_id = OrderId::from(order_id);
    let job_id = JobId::from(job_id);
    let api = &world.system().api;
    let results = join_all((0..n).map(|_| api.resolve(Some(&order_id), Some(&job_id)))).await;
    let decisions = results.into_iter().map(|r| r.expect("Error resolving order")).collect::<Vec<_>>();
    world.decisions.extend(decisions);
}

#[when("the reconciliation sweep runs")]
async fn run_sweep(world: &mut SettlementWorld) {
    let sweeper = ReconciliationApi::new(world.system().api.clone());
    let settings = SweepSettings { grace_period: chrono::Duration::zero(), ..SweepSettings::default() };
    let summary = sweeper.run_sweep(settings).await.expect("Error running the sweep");
    world.sweep = Some(summary);
}

#[then(expr = "the decision is {word}")]
async fn check_decision(world: &mut SettlementWorld, code: String) {
    assert_eq!(world.last_decision().code().as_str(), code);
}

#[then(expr = "every decision is {word}")]
async fn check_all_decisions(world: &mut SettlementWorld, code: String) {
    assert!(!world.decisions.is_empty());
    for decision in &world.decisions {
        assert_eq!(decision.code().as_str(), code, "{decision:?}");
    }
}

#[then(expr = "the decision asks to retry after {int} seconds")]
async fn check_retry_after(world: &mut SettlementWorld, secs: u64) {
    assert_eq!(world.last_decision().retry_after(), Some(std::time::Duration::from_secs(secs)));
}

#[then(expr = "order {word} is {word}")]
async fn check_order_status(world: &mut SettlementWorld, order_id: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world
        .system()
        .db
        .fetch_order_by_order_id(&OrderId::from(order_id))
        .await
        .expect("Error fetching order")
        .expect("Order does not exist");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {word} has {int} SUCCESS transaction(s)")]
async fn check_transactions(world: &mut SettlementWorld, order_id: String, count: usize) {
    let txs = world
        .system()
        .db
        .fetch_transactions_for_order(&OrderId::from(order_id))
        .await
        .expect("Error fetching transactions");
    assert_eq!(txs.len(), count);
}

async fn job_is_paid(world: &SettlementWorld, job_id: String) -> bool {
    world
        .system()
        .db
        .fetch_job(&JobId::from(job_id))
        .await
        .expect("Error fetching job")
        .expect("Job does not exist")
        .is_paid
}

#[then(expr = "job {word} is paid")]
async fn check_job_paid(world: &mut SettlementWorld, job_id: String) {
    assert!(job_is_paid(world, job_id).await);
}

#[then(expr = "job {word} is not paid")]
async fn check_job_not_paid(world: &mut SettlementWorld, job_id: String) {
    assert!(!job_is_paid(world, job_id).await);
}

#[then(expr = "the gateway was queried {int} time(s)")]
async fn check_gateway_calls(world: &mut SettlementWorld, calls: usize) {
    assert_eq!(world.system().gateway.calls(), calls);
}

#[then(expr = "the sweep settled {int}, failed {int} and left {int} pending")]
async fn check_sweep(world: &mut SettlementWorld, settled: usize, failed: usize, pending: usize) {
    let summary = world.sweep.expect("The sweep has not run");
    assert_eq!(summary.settled, settled);
    assert_eq!(summary.failed, failed);
    assert_eq!(summary.still_pending, pending);
}
