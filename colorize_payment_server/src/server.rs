use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use colorize_payment_engine::{
    events::EventProducers,
    AssetJobApi,
    MemoryStatusCache,
    OrderFlowApi,
    ReconciliationApi,
    SettlementApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{
        analytics::create_analytics_event_handlers,
        asset_store::HttpAssetStore,
        gateway::GatewayIntegration,
    },
    middleware::{RequireSignature, SIGNATURE_HEADER},
    reconciliation_worker::start_reconciliation_worker,
    routes::{
        health,
        CheckoutRoute,
        DownloadRoute,
        MarkPaidRoute,
        PaymentStatusRoute,
        ReconcileRoute,
        TrustedMarkPaidRoute,
        VerifyPaymentRoute,
    },
};

pub type Settlement = SettlementApi<SqliteDatabase, GatewayIntegration>;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway =
        GatewayIntegration::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let store = HttpAssetStore::new(config.asset_timeout).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let producers = start_event_handlers(&config).await?;
    let settlement = SettlementApi::new(db.clone(), gateway.clone(), Arc::new(MemoryStatusCache::default()), producers)
        .with_policy(config.settlement_policy());
    if config.reconciliation.disable_worker {
        warn!("🕰️ The reconciliation worker is disabled. Stale orders will only be swept on demand.");
    } else {
        let api = ReconciliationApi::new(settlement.clone());
        let _ = start_reconciliation_worker(api, config.reconciliation.interval, config.reconciliation.sweep);
    }
    let srv = create_server_instance(config, db, settlement, gateway, store)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

async fn start_event_handlers(config: &ServerConfig) -> Result<EventProducers, ServerError> {
    let handlers =
        create_analytics_event_handlers(&config.analytics).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    match handlers {
        Some(handlers) => {
            let producers = handlers.producers();
            handlers.start_handlers().await;
            info!("📬️ Conversion tracking is enabled");
            Ok(producers)
        },
        None => Ok(EventProducers::default()),
    }
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    settlement: Settlement,
    gateway: GatewayIntegration,
    store: HttpAssetStore,
) -> Result<Server, ServerError> {
    if config.internal_secret.is_empty() {
        warn!("🔐️ CPG_INTERNAL_SECRET is not set. All /internal endpoints will refuse requests.");
    }
    let options = ServerOptions::from_config(&config);
    let sweep = config.reconciliation.sweep;
    let internal_secret = config.internal_secret.clone();
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone());
        let jobs_api = AssetJobApi::new(db.clone());
        let reconciliation_api = ReconciliationApi::new(settlement.clone());
        let internal_scope = web::scope("/internal")
            .wrap(RequireSignature::new(SIGNATURE_HEADER, internal_secret.clone()))
            .service(TrustedMarkPaidRoute::<SqliteDatabase>::new())
            .service(ReconcileRoute::<SqliteDatabase, GatewayIntegration>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cps::access_log"))
            .app_data(json_config())
            .app_data(query_config())
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(jobs_api))
            .app_data(web::Data::new(settlement.clone()))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(sweep))
            .service(health)
            .service(CheckoutRoute::<SqliteDatabase, GatewayIntegration>::new())
            .service(DownloadRoute::<SqliteDatabase, GatewayIntegration, HttpAssetStore>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, GatewayIntegration>::new())
            .service(PaymentStatusRoute::<SqliteDatabase>::new())
            .service(MarkPaidRoute::<SqliteDatabase, GatewayIntegration>::new())
            .service(internal_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Malformed bodies get the same JSON error shape as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into())
}
