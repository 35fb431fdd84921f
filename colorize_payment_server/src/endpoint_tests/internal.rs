use actix_web::{http::StatusCode, web};
use colorize_payment_engine::{
    db_types::{JobId, JobStatus},
    AssetJobApi,
    ReconciliationApi,
    SqliteDatabase,
    SweepSettings,
};
use cpg_common::Secret;

use super::{
    helpers::{new_database, post_request, seed_job, seed_order, settlement_api, TestResponse},
    mocks::{silent_gateway, MockGateway},
};
use crate::{
    helpers::calculate_hmac,
    middleware::{RequireSignature, SIGNATURE_HEADER},
    routes::{ReconcileRoute, TrustedMarkPaidRoute},
    server::json_config,
};

const SECRET: &str = "s3cret";

async fn internal_request(
    db: &SqliteDatabase,
    secret: &str,
    path: &str,
    body: &str,
    signature: Option<&str>,
) -> Result<TestResponse, String> {
    let jobs = AssetJobApi::new(db.clone());
    let reconciliation = ReconciliationApi::new(settlement_api(db, silent_gateway()));
    let secret = Secret::new(secret.to_string());
    let headers = signature.map(|s| vec![(SIGNATURE_HEADER, s)]).unwrap_or_default();
    post_request(path, body, &headers, move |cfg| {
        cfg.app_data(json_config())
            .app_data(web::Data::new(jobs))
            .app_data(web::Data::new(reconciliation))
            .app_data(web::Data::new(SweepSettings::default()))
            .service(
                web::scope("/internal")
                    .wrap(RequireSignature::new(SIGNATURE_HEADER, secret))
                    .service(TrustedMarkPaidRoute::<SqliteDatabase>::new())
                    .service(ReconcileRoute::<SqliteDatabase, MockGateway>::new()),
            );
    })
    .await
}

async fn is_paid(db: &SqliteDatabase, job_id: &str) -> bool {
    AssetJobApi::new(db.clone()).fetch_job(&JobId::from(job_id)).await.unwrap().unwrap().is_paid
}

#[actix_web::test]
async fn signed_request_marks_the_job_paid() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, Some("https://assets.example.com/results/j1.png")).await;
    let body = r#"{"job_id":"j1"}"#;
    let signature = calculate_hmac(SECRET, body.as_bytes());
    let res = internal_request(&db, SECRET, "/internal/mark_paid", body, Some(&signature)).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    let job = res.json();
    assert_eq!(job["job_id"], "j1");
    assert_eq!(job["is_paid"], true);
    assert!(is_paid(&db, "j1").await);
}

#[actix_web::test]
async fn unknown_job_is_not_found() {
    let db = new_database().await;
    let body = r#"{"job_id":"nope"}"#;
    let signature = calculate_hmac(SECRET, body.as_bytes());
    let res = internal_request(&db, SECRET, "/internal/mark_paid", body, Some(&signature)).await.unwrap();
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn a_bad_signature_is_refused() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, None).await;
    let body = r#"{"job_id":"j1"}"#;
    let signature = calculate_hmac("not-the-secret", body.as_bytes());
    let err = internal_request(&db, SECRET, "/internal/mark_paid", body, Some(&signature)).await.err();
    assert_eq!(err.as_deref(), Some("Invalid HMAC signature."));
    assert!(!is_paid(&db, "j1").await);
}

#[actix_web::test]
async fn a_signature_covers_the_whole_body() {
    let db = new_database().await;
    seed_job(&db, "j2", JobStatus::Done, None).await;
    let signature = calculate_hmac(SECRET, br#"{"job_id":"j1"}"#);
    let body = r#"{"job_id":"j2"}"#;
    let err = internal_request(&db, SECRET, "/internal/mark_paid", body, Some(&signature)).await.err();
    assert_eq!(err.as_deref(), Some("Invalid HMAC signature."));
    assert!(!is_paid(&db, "j2").await);
}

#[actix_web::test]
async fn an_unsigned_request_is_refused() {
    let db = new_database().await;
    let err = internal_request(&db, SECRET, "/internal/mark_paid", r#"{"job_id":"j1"}"#, None).await.err();
    assert_eq!(err.as_deref(), Some("No HMAC signature found."));
}

#[actix_web::test]
async fn without_a_secret_internal_routes_are_closed() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, None).await;
    let body = r#"{"job_id":"j1"}"#;
    // Even a signature made with the empty key is refused
    let signature = calculate_hmac("", body.as_bytes());
    let err = internal_request(&db, "", "/internal/mark_paid", body, Some(&signature)).await.err();
    assert_eq!(err.as_deref(), Some("Internal endpoints are disabled."));
    assert!(!is_paid(&db, "j1").await);
}

#[actix_web::test]
async fn reconcile_runs_a_sweep() {
    let db = new_database().await;
    seed_job(&db, "j1", JobStatus::Done, None).await;
    // Inside the grace period, so the sweep leaves it alone and the gateway is never asked
    seed_order(&db, "o1", "j1").await;
    let body = "{}";
    let signature = calculate_hmac(SECRET, body.as_bytes());
    let res = internal_request(&db, SECRET, "/internal/reconcile", body, Some(&signature)).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    let summary = res.json();
    assert_eq!(summary["examined"], 0);
    assert_eq!(summary["errors"], 0);
}
