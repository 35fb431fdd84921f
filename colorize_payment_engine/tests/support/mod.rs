#![allow(dead_code)]
pub mod prepare_env;

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use colorize_payment_engine::{
    cpe_api::retry::SettlementPolicy,
    db_types::{JobId, MinorUnits, NewAssetJob, NewOrder, Order, OrderId},
    events::{EventHandlers, EventHooks, EventProducers},
    JobManagement,
    OrderManagement,
    SettlementApi,
    SettlementDatabase,
    SqliteDatabase,
    StatusCache,
};

use self::{
    gateway::ScriptedGateway,
    prepare_env::{prepare_test_env, random_db_path},
};

/// Counts how often the order paid and order failed hooks fire.
#[derive(Default, Clone)]
pub struct HookCounter {
    paid: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl HookCounter {
    pub fn paid(&self) -> usize {
        self.paid.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Hooks run on their own tasks, so give them a moment to land.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    pub async fn producers(&self) -> EventProducers {
        let mut hooks = EventHooks::default();
        let paid = self.paid.clone();
        hooks.on_order_paid(move |_ev| {
            let paid = paid.clone();
            Box::pin(async move {
                paid.fetch_add(1, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let failed = self.failed.clone();
        hooks.on_order_failed(move |_ev| {
            let failed = failed.clone();
            Box::pin(async move {
                failed.fetch_add(1, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let handlers = EventHandlers::new(16, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;
        producers
    }
}

pub struct TestSystem {
    pub db: SqliteDatabase,
    pub gateway: ScriptedGateway,
    pub hooks: HookCounter,
    pub api: SettlementApi<SqliteDatabase, ScriptedGateway>,
}

impl std::fmt::Debug for TestSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TestSystem ({})", self.db.url())
    }
}

impl TestSystem {
    pub async fn new(cache: Arc<dyn StatusCache>) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let gateway = ScriptedGateway::default();
        let hooks = HookCounter::default();
        let producers = hooks.producers().await;
        let api = SettlementApi::new(db.clone(), gateway.clone(), cache, producers)
            .with_policy(SettlementPolicy::default().without_delays());
        Self { db, gateway, hooks, api }
    }

    pub async fn tear_down(self) {
        prepare_env::tear_down(self.db).await;
    }
}

/// Creates job `job_id` and a pending order for it, already linked to gateway order `cf_<order_id>`.
pub async fn seed_order<B: OrderManagement + JobManagement>(db: &B, order_id: &str, job_id: &str) -> Order {
    let job = JobId::from(job_id);
    db.insert_job(NewAssetJob::new(job.clone(), format!("https://uploads.example.com/{job_id}.jpg")))
        .await
        .expect("Error inserting job");
    let order = NewOrder::for_job(OrderId::from(order_id), job, MinorUnits::from(7900)).with_user_id("alice");
    let order = db.insert_order(order).await.expect("Error inserting order").order;
    db.attach_gateway_order_id(&order.order_id, &format!("cf_{order_id}")).await.expect("Error attaching gateway id")
}
