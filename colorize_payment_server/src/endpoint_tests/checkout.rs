use actix_web::{http::StatusCode, web};
use colorize_payment_engine::{
    db_types::{JobId, JobStatus, OrderId},
    AssetJobApi,
    OrderFlowApi,
    SqliteDatabase,
};
use gateway_tools::{CheckoutSession, GatewayApiError};

use super::{
    helpers::{new_database, post_request, seed_job, TestResponse},
    mocks::MockCheckout,
};
use crate::{config::ServerOptions, routes::CheckoutRoute, server::json_config};

const CHECKOUT_BODY: &str = r#"{
    "order_id": "o1",
    "job_id": "j1",
    "amount": 7900,
    "user_id": "u42",
    "customer": { "customer_phone": "9999999999", "customer_email": "asha@example.com" },
    "gclid": "g-123"
}"#;

fn issuing_session() -> MockCheckout {
    let mut gateway = MockCheckout::new();
    gateway.expect_create_checkout().times(1).returning(|order, customer| {
        assert_eq!(customer.customer_id, "u42");
        Ok(CheckoutSession {
            cf_order_id: "cf_2001".into(),
            order_id: order.order_id.as_str().into(),
            order_status: "ACTIVE".into(),
            payment_session_id: "session_abc".into(),
        })
    });
    gateway
}

fn untouched_gateway() -> MockCheckout {
    let mut gateway = MockCheckout::new();
    gateway.expect_create_checkout().never();
    gateway
}

async fn checkout(db: &SqliteDatabase, gateway: MockCheckout) -> TestResponse {
    let orders = OrderFlowApi::new(db.clone());
    let headers = [("User-Agent", "Mozilla/5.0 (Android 14)"), ("Referer", "https://colorize.example.com/editor")];
    post_request("/checkout", CHECKOUT_BODY, &headers, move |cfg| {
        cfg.app_data(json_config())
            .app_data(web::Data::new(ServerOptions::default()))
            .app_data(web::Data::new(orders))
            .app_data(web::Data::new(gateway))
            .service(CheckoutRoute::<SqliteDatabase, MockCheckout>::new());
    })
    .await
    .expect("Request failed")
}

#[actix_web::test]
async fn checkout_stores_the_order_and_its_session() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some("https://assets.example.com/results/j1.png")).await;
    let res = checkout(&db, issuing_session()).await;
    assert_eq!(res.status, StatusCode::OK);
    let body = res.json();
    assert_eq!(body["gateway_order_id"], "cf_2001");
    assert_eq!(body["payment_session_id"], "session_abc");

    let order = OrderFlowApi::new(db.clone()).fetch_order(&OrderId::from("o1")).await.unwrap().unwrap();
    assert_eq!(order.gateway_order_id.as_deref(), Some("cf_2001"));
    assert_eq!(order.job_id, Some(JobId::from("j1")));
    let tracking = order.tracking().expect("tracking data is captured at checkout");
    assert_eq!(tracking.user_agent.as_deref(), Some("Mozilla/5.0 (Android 14)"));
    assert_eq!(tracking.referrer.as_deref(), Some("https://colorize.example.com/editor"));
    assert_eq!(tracking.gclid.as_deref(), Some("g-123"));
}

#[actix_web::test]
async fn a_paid_job_cannot_be_bought_twice() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some("https://assets.example.com/results/j1.png")).await;
    AssetJobApi::new(db.clone()).mark_paid_trusted(&JobId::from("j1")).await.unwrap();
    let res = checkout(&db, untouched_gateway()).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.json()["code"], "CONFLICT");
}

#[actix_web::test]
async fn an_order_is_checked_out_once() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Pending, None).await;
    let res = checkout(&db, issuing_session()).await;
    assert_eq!(res.status, StatusCode::OK);
    let res = checkout(&db, untouched_gateway()).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn a_failed_session_can_be_retried() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Pending, None).await;
    let mut gateway = MockCheckout::new();
    gateway
        .expect_create_checkout()
        .times(1)
        .returning(|_, _| Err(GatewayApiError::Transport("connection refused".into())));
    let res = checkout(&db, gateway).await;
    assert_eq!(res.status, StatusCode::BAD_GATEWAY);
    assert_eq!(res.json()["code"], "CHECKOUT_FAILED");
    // The order was kept, without a session
    let order = OrderFlowApi::new(db.clone()).fetch_order(&OrderId::from("o1")).await.unwrap().unwrap();
    assert!(order.gateway_order_id.is_none());

    let res = checkout(&db, issuing_session()).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["gateway_order_id"], "cf_2001");
}

#[actix_web::test]
async fn checkout_rejects_a_zero_amount() {
    let db = new_database().await;
    let orders = OrderFlowApi::new(db.clone());
    let body = r#"{"order_id":"o9","amount":0,"customer":{"customer_phone":"9999999999"}}"#;
    let res = post_request("/checkout", body, &[], move |cfg| {
        cfg.app_data(json_config())
            .app_data(web::Data::new(ServerOptions::default()))
            .app_data(web::Data::new(orders))
            .app_data(web::Data::new(untouched_gateway()))
            .service(CheckoutRoute::<SqliteDatabase, MockCheckout>::new());
    })
    .await
    .expect("Request failed");
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}
