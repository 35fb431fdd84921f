use std::sync::Arc;

use colorize_payment_engine::MemoryStatusCache;
use cpg_common::PaymentObservation;
use cucumber::given;

use crate::{
    cucumber::SettlementWorld,
    support::{gateway::unavailable, seed_order, TestSystem},
};

#[given("a fresh install")]
async fn fresh_database(world: &mut SettlementWorld) {
    let system = TestSystem::new(Arc::new(MemoryStatusCache::default())).await;
    world.system = Some(system);
}

#[given(expr = "a pending order {word} for job {word}")]
async fn pending_order(world: &mut SettlementWorld, order_id: String, job_id: String) {
    seed_order(&world.system().db, &order_id, &job_id).await;
}

#[given(expr = "the gateway reports {word} for order {word}")]
async fn gateway_reports(world: &mut SettlementWorld, state: String, order_id: String) {
    world.system().gateway.always(&order_id, Ok(PaymentObservation::new(state)));
}

#[given(expr = "the gateway reports {word} once for order {word}")]
async fn gateway_reports_once(world: &mut SettlementWorld, state: String, order_id: String) {
    world.system().gateway.then(&order_id, Ok(PaymentObservation::new(state)));
}

#[given(expr = "the gateway cannot be reached for order {word}")]
async fn gateway_unreachable(world: &mut SettlementWorld, order_id: String) {
    world.system().gateway.always(&order_id, unavailable());
}
