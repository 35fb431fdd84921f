use actix_web::{http::StatusCode, web};
use colorize_payment_engine::{
    db_types::{JobId, JobStatus, OrderStatusType},
    traits::GatewayError,
    AssetJobApi,
    OrderFlowApi,
    SqliteDatabase,
};

use super::{
    helpers::{get_request, new_database, post_request, seed_job, seed_order, settlement_api, TestResponse},
    mocks::{gateway_reporting, silent_gateway, MockGateway},
};
use crate::{
    routes::{MarkPaidRoute, PaymentStatusRoute, VerifyPaymentRoute},
    server::{json_config, query_config},
};

const RESULT_URL: &str = "https://assets.example.com/results/j1.png";

async fn verify(db: &SqliteDatabase, query: &str, gateway: MockGateway) -> TestResponse {
    let api = settlement_api(db, gateway);
    get_request(&format!("/payment/verify?{query}"), move |cfg| {
        cfg.app_data(query_config())
            .app_data(web::Data::new(api))
            .service(VerifyPaymentRoute::<SqliteDatabase, MockGateway>::new());
    })
    .await
    .expect("Request failed")
}

async fn mark_paid(db: &SqliteDatabase, body: &str, gateway: MockGateway) -> TestResponse {
    let api = settlement_api(db, gateway);
    post_request("/payment/mark_paid", body, &[], move |cfg| {
        cfg.app_data(json_config())
            .app_data(web::Data::new(api))
            .service(MarkPaidRoute::<SqliteDatabase, MockGateway>::new());
    })
    .await
    .expect("Request failed")
}

//----------------------------------------------   Verify  ----------------------------------------------------

#[actix_web::test]
async fn verify_paid_order_links_to_the_download() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let res = verify(&db, "order_id=o1&attempt=0", gateway_reporting("PAID")).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["code"], "PAID");
    assert_eq!(body["order_id"], "o1");
    assert_eq!(body["job_id"], "j1");
    assert_eq!(body["order_status"], "Paid");
    assert_eq!(body["unlocked"], true);
    assert_eq!(body["download_url"], "/download/j1?order_id=o1");
}

#[actix_web::test]
async fn verify_a_trusted_unlock_by_job() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    AssetJobApi::new(db.clone()).mark_paid_trusted(&JobId::from("j1")).await.unwrap();
    let res = verify(&db, "job_id=j1", silent_gateway()).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["code"], "PAID");
    assert_eq!(body["job_id"], "j1");
    assert!(body.get("order_id").is_none());
    assert_eq!(body["unlocked"], true);
    assert_eq!(body["download_url"], "/download/j1");
}

#[actix_web::test]
async fn verify_needs_an_identifier() {
    let db = new_database().await;
    let res = verify(&db, "order_id=&attempt=2", silent_gateway()).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "BAD_REQUEST");
}

#[actix_web::test]
async fn verify_pending_backs_off_with_the_attempt_count() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let res = verify(&db, "order_id=o1&attempt=0", gateway_reporting("ACTIVE")).await;
    assert_eq!(res.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(res.json()["code"], "PAYMENT_PENDING");
    assert_eq!(res.header("retry-after").as_deref(), Some("5"));
    // 2s doubling: the fourth poll waits 16s
    let res = verify(&db, "order_id=o1&attempt=3", gateway_reporting("ACTIVE")).await;
    assert_eq!(res.header("retry-after").as_deref(), Some("16"));
}

#[actix_web::test]
async fn verify_gives_up_after_too_many_polls() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let res = verify(&db, "order_id=o1&job_id=j1&attempt=10", gateway_reporting("PENDING")).await;
    assert_eq!(res.status, StatusCode::PAYMENT_REQUIRED);
    assert!(res.header("retry-after").is_none());
    let body = res.json();
    assert_eq!(body["code"], "CONTACT_SUPPORT");
    assert_eq!(body["order_id"], "o1");
    assert_eq!(body["job_id"], "j1");
}

#[actix_web::test]
async fn verify_gateway_outage_is_503() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let mut gateway = MockGateway::new();
    gateway.expect_query_status().returning(|_| Err(GatewayError::Unavailable("connection reset".into())));
    let res = verify(&db, "order_id=o1", gateway).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.json()["code"], "VERIFICATION_ERROR");
    assert_eq!(res.header("retry-after").as_deref(), Some("10"));
    // An outage is never mistaken for a failed payment
    let order = OrderFlowApi::new(db.clone()).fetch_order(&"o1".into()).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn verify_by_job_while_processing() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Processing, None).await;
    seed_order(&db, "o1", "j1").await;
    let res = verify(&db, "job_id=j1&attempt=1", gateway_reporting("PAID")).await;
    assert_eq!(res.status, StatusCode::ACCEPTED);
    assert_eq!(res.json()["code"], "PROCESSING");
    assert_eq!(res.header("retry-after").as_deref(), Some("5"));
}

//----------------------------------------------   Mark paid  ----------------------------------------------------

#[actix_web::test]
async fn mark_paid_unlocks_the_job_of_a_paid_order() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Processing, None).await;
    seed_order(&db, "o1", "j1").await;
    let res = mark_paid(&db, r#"{"order_id":"o1","job_id":"j1"}"#, gateway_reporting("PAID")).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["code"], "PAID");
    assert_eq!(body["unlocked"], true);
    assert!(body.get("download_url").is_none());
    let job = AssetJobApi::new(db.clone()).fetch_job(&JobId::from("j1")).await.unwrap().unwrap();
    assert!(job.is_paid);
}

#[actix_web::test]
async fn mark_paid_refuses_an_unpaid_order() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let res = mark_paid(&db, r#"{"order_id":"o1"}"#, gateway_reporting("ACTIVE")).await;
    assert_eq!(res.status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(res.json()["code"], "PAYMENT_PENDING");
    let job = AssetJobApi::new(db.clone()).fetch_job(&JobId::from("j1")).await.unwrap().unwrap();
    assert!(!job.is_paid);
}

#[actix_web::test]
async fn mark_paid_refuses_a_foreign_job() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some(RESULT_URL)).await;
    seed_job(&db, "j2", JobStatus::Done, Some(RESULT_URL)).await;
    seed_order(&db, "o1", "j1").await;
    let res = mark_paid(&db, r#"{"order_id":"o1","job_id":"j2"}"#, silent_gateway()).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["code"], "NO_PAYMENT_FOUND");
    let job = AssetJobApi::new(db.clone()).fetch_job(&JobId::from("j2")).await.unwrap().unwrap();
    assert!(!job.is_paid);
}

#[actix_web::test]
async fn mark_paid_requires_an_order_id() {
    let db = new_database().await;
    let res = mark_paid(&db, r#"{"job_id":"j1"}"#, silent_gateway()).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["code"], "BAD_REQUEST");
}

//----------------------------------------------   Status  ----------------------------------------------------

#[actix_web::test]
async fn status_reads_the_stored_order() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Pending, None).await;
    seed_order(&db, "o1", "j1").await;
    let orders = OrderFlowApi::new(db.clone());
    let res = get_request("/payment/status/o1", move |cfg| {
        cfg.app_data(web::Data::new(orders)).service(PaymentStatusRoute::<SqliteDatabase>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["order_id"], "o1");
    assert_eq!(body["status"], "Pending");
    assert_eq!(body["amount"], 7900);
    assert_eq!(body["job_id"], "j1");
    assert_eq!(body["tx_type"], "Purchase");
}

#[actix_web::test]
async fn status_of_an_unknown_order() {
    let db = new_database().await;
    let orders = OrderFlowApi::new(db.clone());
    let res = get_request("/payment/status/nope", move |cfg| {
        cfg.app_data(web::Data::new(orders)).service(PaymentStatusRoute::<SqliteDatabase>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["code"], "NOT_FOUND");
}
