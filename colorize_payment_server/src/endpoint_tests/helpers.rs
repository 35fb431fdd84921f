use std::sync::Arc;

use actix_web::{
    body::MessageBody,
    http::{header::HeaderMap, StatusCode},
    test,
    test::TestRequest,
    web::{Bytes, ServiceConfig},
    App,
};
use colorize_payment_engine::{
    cpe_api::retry::SettlementPolicy,
    db_types::{AssetJob, JobId, JobStatus, MinorUnits, NewAssetJob, NewOrder, Order, OrderId},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    AssetJobApi,
    NoStatusCache,
    OrderFlowApi,
    SettlementApi,
    SqliteDatabase,
};
use log::debug;
use serde_json::Value;

use super::mocks::MockGateway;

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).and_then(|v| v.to_str().ok()).map(String::from)
    }
}

/// A freshly migrated database that no other test touches.
pub async fn new_database() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database")
}

/// Settlement without retry delays and without a status cache, so that every call reaches the mock gateway.
pub fn settlement_api(db: &SqliteDatabase, gateway: MockGateway) -> SettlementApi<SqliteDatabase, MockGateway> {
    SettlementApi::new(db.clone(), gateway, Arc::new(NoStatusCache), EventProducers::default())
        .with_policy(SettlementPolicy::default().without_delays())
}

pub async fn seed_job(db: &SqliteDatabase, job_id: &str, status: JobStatus, result_url: Option<&str>) -> AssetJob {
    let api = AssetJobApi::new(db.clone());
    let job_id = JobId::from(job_id);
    let job = api
        .submit_job(NewAssetJob::new(job_id.clone(), format!("https://uploads.example.com/{job_id}.png")))
        .await
        .expect("Error submitting job");
    if status == JobStatus::Pending {
        return job;
    }
    api.record_result(&job_id, status, result_url).await.expect("Error updating job")
}

pub async fn seed_order(db: &SqliteDatabase, order_id: &str, job_id: &str) -> Order {
    let order = NewOrder::for_job(OrderId::from(order_id), JobId::from(job_id), MinorUnits::from(7900));
    OrderFlowApi::new(db.clone()).create_order(order).await.expect("Error creating order").order
}

pub async fn get_request<F>(path: &str, configure: F) -> Result<TestResponse, String>
where F: FnOnce(&mut ServiceConfig) {
    call(TestRequest::get().uri(path), configure).await
}

pub async fn post_request<F>(
    path: &str,
    body: &str,
    headers: &[(&str, &str)],
    configure: F,
) -> Result<TestResponse, String>
where
    F: FnOnce(&mut ServiceConfig),
{
    let mut req = TestRequest::post().uri(path).insert_header(("Content-Type", "application/json"));
    for (name, value) in headers {
        req = req.insert_header((*name, *value));
    }
    call(req.set_payload(body.to_string()), configure).await
}

async fn call<F>(req: TestRequest, configure: F) -> Result<TestResponse, String>
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let headers = res.headers().clone();
    let body = res.into_body().try_into_bytes().unwrap_or_default();
    Ok(TestResponse { status, headers, body })
}
