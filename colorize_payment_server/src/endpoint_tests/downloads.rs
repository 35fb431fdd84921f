use actix_web::{http::StatusCode, web, web::Bytes};
use colorize_payment_engine::{
    db_types::{JobId, JobStatus},
    AssetJobApi,
    SqliteDatabase,
};

use super::{
    helpers::{get_request, new_database, seed_job, seed_order, settlement_api},
    mocks::{gateway_reporting, silent_gateway, MockAssetStorage, MockGateway},
};
use crate::{
    integrations::asset_store::{AssetBytes, AssetStoreError},
    routes::DownloadRoute,
    server::query_config,
};

const RESULT_URL: &str = "https://assets.example.com/results/j1.jpg";

fn serving_jpeg() -> MockAssetStorage {
    let mut store = MockAssetStorage::new();
    store.expect_fetch().withf(|location| location.to_string() == RESULT_URL).times(1).returning(|_| {
        Ok(AssetBytes { bytes: Bytes::from_static(b"\xff\xd8colorized"), content_type: "image/jpeg".into() })
    });
    store
}

fn untouched_store() -> MockAssetStorage {
    let mut store = MockAssetStorage::new();
    store.expect_fetch().never();
    store
}

async fn download(
    db: &SqliteDatabase,
    path: &str,
    gateway: MockGateway,
    store: MockAssetStorage,
) -> super::helpers::TestResponse {
    let api = settlement_api(db, gateway);
    get_request(path, move |cfg| {
        cfg.app_data(query_config())
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(store))
            .service(DownloadRoute::<SqliteDatabase, MockGateway, MockAssetStorage>::new());
    })
    .await
    .expect("Request failed")
}

#[actix_web::test]
async fn paid_order_releases_the_image() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let res = download(&db, "/download/j1?order_id=o1", gateway_reporting("PAID"), serving_jpeg()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.header("content-type").as_deref(), Some("image/jpeg"));
    assert_eq!(res.header("content-disposition").as_deref(), Some("attachment; filename=\"colorized-j1.jpg\""));
    assert_eq!(res.body, Bytes::from_static(b"\xff\xd8colorized"));
    // The download unlocked the job as a side effect
    let job = AssetJobApi::new(db.clone()).fetch_job(&JobId::from("j1")).await.unwrap().unwrap();
    assert!(job.is_paid);
}

#[actix_web::test]
async fn the_job_alone_finds_its_order() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let res = download(&db, "/download/j1", gateway_reporting("SUCCESS"), serving_jpeg()).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[actix_web::test]
async fn pending_payment_is_402_with_a_retry_hint() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let res = download(&db, "/download/j1?order_id=o1", gateway_reporting("ACTIVE"), untouched_store()).await;
    assert_eq!(res.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(res.header("retry-after").as_deref(), Some("5"));
    let body = res.json();
    assert_eq!(body["code"], "PAYMENT_PENDING");
    assert_eq!(body["order_id"], "o1");
    assert_eq!(body["job_id"], "j1");
}

#[actix_web::test]
async fn failed_payment_is_terminal() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let res = download(&db, "/download/j1?order_id=o1", gateway_reporting("USER_DROPPED"), untouched_store()).await;
    assert_eq!(res.status, StatusCode::PAYMENT_REQUIRED);
    assert!(res.header("retry-after").is_none());
    assert_eq!(res.json()["code"], "PAYMENT_FAILED");
}

#[actix_web::test]
async fn job_without_an_order_is_not_found() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    let res = download(&db, "/download/j1", silent_gateway(), untouched_store()).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["code"], "NO_PAYMENT_FOUND");
}

#[actix_web::test]
async fn a_trusted_unlock_releases_the_image() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    AssetJobApi::new(db.clone()).mark_paid_trusted(&JobId::from("j1")).await.unwrap();
    let res = download(&db, "/download/j1", silent_gateway(), serving_jpeg()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, Bytes::from_static(b"\xff\xd8colorized"));
    // An order id that does not exist still gets nothing
    let res = download(&db, "/download/j1?order_id=o404", silent_gateway(), untouched_store()).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["code"], "NO_PAYMENT_FOUND");
}

#[actix_web::test]
async fn an_order_cannot_unlock_someone_elses_job() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_job(&db, "j2", JobStatus::Done, Some("https://assets.example.com/results/j2.jpg")).await;
    seed_order(&db, "o2", "j2").await;
    let res = download(&db, "/download/j1?order_id=o2", silent_gateway(), untouched_store()).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["code"], "NO_PAYMENT_FOUND");
}

#[actix_web::test]
async fn paid_but_still_processing() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Processing, None).await;
    seed_order(&db, "o1", "j1").await;
    let res = download(&db, "/download/j1?order_id=o1", gateway_reporting("PAID"), untouched_store()).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    assert!(res.header("retry-after").is_some());
    assert_eq!(res.json()["code"], "PROCESSING");
}

#[actix_web::test]
async fn paid_but_processing_failed() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Failed, None).await;
    seed_order(&db, "o1", "j1").await;
    let res = download(&db, "/download/j1?order_id=o1", gateway_reporting("PAID"), untouched_store()).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.json()["code"], "PROCESSING_FAILED");
}

#[actix_web::test]
async fn result_missing_from_storage_is_not_ready() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let mut store = MockAssetStorage::new();
    store.expect_fetch().times(1).returning(|location| Err(AssetStoreError::NotFound(location.to_string())));
    let res = download(&db, "/download/j1?order_id=o1", gateway_reporting("PAID"), store).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    assert_eq!(res.json()["code"], "ASSET_NOT_READY");
}

#[actix_web::test]
async fn storage_outage_is_a_bad_gateway() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let mut store = MockAssetStorage::new();
    store.expect_fetch().returning(|_| Err(AssetStoreError::Unavailable("status 503".into())));
    let res = download(&db, "/download/j1?order_id=o1", gateway_reporting("PAID"), store).await;
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    assert_eq!(res.json()["code"], "ASSET_STORE_ERROR");
}

#[actix_web::test]
async fn a_settled_order_is_not_verified_again() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let res = download(&db, "/download/j1?order_id=o1", gateway_reporting("PAID"), serving_jpeg()).await;
    assert_eq!(res.status, StatusCode::OK);
    // Paid is terminal: the second download must not reach the gateway
    let res = download(&db, "/download/j1?order_id=o1", silent_gateway(), serving_jpeg()).await;
    assert_eq!(res.status, StatusCode::OK);
}
