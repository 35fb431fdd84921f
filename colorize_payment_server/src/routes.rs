//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Every handler that has to know whether something is paid for calls [`SettlementApi::resolve`] and translates the
//! answer with the helpers in [`crate::asset_release`]. Handlers never look at the gateway's answer themselves.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (e.g. I/O, database operations,
//! gateway calls) must be awaited, never waited on.
use actix_web::{
    get,
    http::header::{CONTENT_DISPOSITION, REFERER, USER_AGENT},
    web,
    HttpRequest,
    HttpResponse,
    Responder,
};
use chrono::Utc;
use colorize_payment_engine::{
    db_types::{JobId, OrderId, OrderStatusType},
    traits::InsertOrderResult,
    AssetJobApi,
    JobManagement,
    OrderFlowApi,
    PaymentGatewayClient,
    ReconciliationApi,
    SettlementApi,
    SettlementDatabase,
    SweepSettings,
};
use log::*;

use crate::{
    asset_release::{asset_store_error, references_for, released_job, released_or_error, result_location, Pacing},
    config::ServerOptions,
    data_objects::{
        CheckoutParams,
        CheckoutResponse,
        DownloadParams,
        MarkPaidParams,
        OrderStatusResponse,
        RequestContext,
        SettlementResponse,
        TrustedMarkPaidParams,
        VerifyParams,
    },
    errors::{References, ServerError},
    helpers::{attachment_disposition, get_remote_ip},
    integrations::{asset_store::AssetStore, gateway::CheckoutGateway},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >(
            $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+
        );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! {
        impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory
            for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl SettlementDatabase, CheckoutGateway);
/// Creates the order for a purchase and asks the gateway for a checkout session.
///
/// The order is stored before the gateway is called, so that a payment can never exist for an order we don't know
/// about. Re-posting an order id that has no gateway session yet retries the session; once a session exists, the
/// order is locked and the call is refused with 409.
pub async fn checkout<B, C>(
    req: HttpRequest,
    body: web::Json<CheckoutParams>,
    options: web::Data<ServerOptions>,
    orders: web::Data<OrderFlowApi<B>>,
    gateway: web::Data<C>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    C: CheckoutGateway,
{
    trace!("💻️ Received checkout request for order {}", body.order_id);
    let context = RequestContext {
        client_ip: get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded).map(|ip| ip.to_string()),
        user_agent: header_string(&req, USER_AGENT),
        referrer: header_string(&req, REFERER),
    };
    let (new_order, customer) = body.into_inner().into_order(context, Utc::now());
    let InsertOrderResult { order, inserted } = orders.create_order(new_order).await?;
    if !inserted {
        if let Some(gateway_order_id) = order.gateway_order_id.as_deref() {
            debug!("💻️ Order {} already has checkout session {gateway_order_id}", order.order_id);
            return Err(ServerError::Conflict(format!("Order {} has already been checked out", order.order_id)));
        }
        if order.status != OrderStatusType::Pending {
            return Err(ServerError::Conflict(format!("Order {} is already {}", order.order_id, order.status)));
        }
    }
    let session = gateway.create_checkout(&order, customer).await.map_err(|e| {
        warn!("💻️ Could not create a checkout session for order {}. {e}", order.order_id);
        ServerError::CheckoutFailed(e.to_string())
    })?;
    let order = orders.attach_gateway_order_id(&order.order_id, &session.cf_order_id).await?;
    info!("💻️ Checkout session created for order {} ({})", order.order_id, order.amount);
    Ok(HttpResponse::Ok().json(CheckoutResponse {
        order,
        gateway_order_id: session.cf_order_id,
        payment_session_id: session.payment_session_id,
    }))
}

fn header_string(req: &HttpRequest, name: actix_web::http::header::HeaderName) -> Option<String> {
    req.headers().get(name).and_then(|v| v.to_str().ok()).map(String::from)
}

//----------------------------------------------   Download  ----------------------------------------------------
route!(download => Get "/download/{job_id}" impl SettlementDatabase, PaymentGatewayClient, AssetStore);
/// Streams the colorized image of a job, if it has been paid for.
///
/// The optional `order_id` query parameter ties the download to a specific order. Without it, the job's own orders
/// are consulted.
pub async fn download<B, G, A>(
    path: web::Path<JobId>,
    query: web::Query<DownloadParams>,
    api: web::Data<SettlementApi<B, G>>,
    store: web::Data<A>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: PaymentGatewayClient,
    A: AssetStore,
{
    let job_id = path.into_inner();
    let order_id = query.order_id();
    trace!("💻️ Received download request for job {job_id}");
    let pacing = Pacing::once(&api.policy().poll);
    let decision = api.resolve(order_id.as_ref(), Some(&job_id)).await?;
    let released = released_or_error(decision, References::new(order_id.as_ref(), Some(&job_id)), pacing)?;
    let refs = references_for(&released);
    let job = released_job(&released, pacing)?;
    let location = result_location(job, refs.clone(), pacing)?;
    let asset = store.fetch(&location).await.map_err(|e| asset_store_error(e, refs))?;
    match released.order_id() {
        Some(order_id) => info!("💻️ Releasing job {job_id} for order {order_id}"),
        None => info!("💻️ Releasing job {job_id}, unlocked without an order"),
    }
    Ok(HttpResponse::Ok()
        .content_type(asset.content_type.as_str())
        .insert_header((CONTENT_DISPOSITION, attachment_disposition(&job_id, &asset.content_type)))
        .body(asset.bytes))
}

//----------------------------------------------   Verify  ----------------------------------------------------
route!(verify_payment => Get "/payment/verify" impl SettlementDatabase, PaymentGatewayClient);
/// The payment success page polls this after the customer returns from the gateway.
///
/// Clients send the number of times they have already polled as `attempt`. The retry hint grows with it, and once it
/// reaches the configured maximum the answer is `CONTACT_SUPPORT`.
pub async fn verify_payment<B, G>(
    query: web::Query<VerifyParams>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: PaymentGatewayClient,
{
    let params = query.into_inner();
    let (order_id, job_id) = (params.order_id(), params.job_id());
    if order_id.is_none() && job_id.is_none() {
        return Err(ServerError::MissingIdentifier);
    }
    trace!("💻️ Verifying payment. order: {order_id:?}, job: {job_id:?}, attempt: {:?}", params.attempt);
    let pacing = Pacing::polling(params.attempt, &api.policy().poll);
    let decision = api.resolve(order_id.as_ref(), job_id.as_ref()).await?;
    let released = released_or_error(decision, References::new(order_id.as_ref(), job_id.as_ref()), pacing)?;
    let download_url = match released.job_id() {
        Some(_) => {
            let job = released_job(&released, pacing)?;
            result_location(job, references_for(&released), pacing)?;
            Some(download_path(&job.job_id, released.order_id()))
        },
        None => None,
    };
    Ok(HttpResponse::Ok().json(SettlementResponse::paid(&released, download_url)))
}

fn download_path(job_id: &JobId, order_id: Option<&OrderId>) -> String {
    match order_id {
        Some(order_id) => format!("/download/{}?order_id={}", job_id.as_str(), order_id.as_str()),
        None => format!("/download/{}", job_id.as_str()),
    }
}

//----------------------------------------------   Status  ----------------------------------------------------
route!(payment_status => Get "/payment/status/{order_id}" impl SettlementDatabase);
/// The order as stored. This never asks the gateway and never changes anything.
pub async fn payment_status<B: SettlementDatabase>(
    path: web::Path<OrderId>,
    orders: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ Received status request for order {order_id}");
    let order = orders
        .fetch_order(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    Ok(HttpResponse::Ok().json(OrderStatusResponse::from(order)))
}

//----------------------------------------------   Mark paid  ----------------------------------------------------
route!(mark_paid => Post "/payment/mark_paid" impl SettlementDatabase, PaymentGatewayClient);
/// Unlocks a job on behalf of an untrusted caller. This is a full resolution: the job is only unlocked if the order
/// is paid, and the order must be the one that references the job.
pub async fn mark_paid<B, G>(
    body: web::Json<MarkPaidParams>,
    api: web::Data<SettlementApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: PaymentGatewayClient,
{
    let MarkPaidParams { order_id, job_id } = body.into_inner();
    trace!("💻️ Received mark-paid request for order {order_id}");
    let decision = api.resolve(Some(&order_id), job_id.as_ref()).await?;
    let refs = References::new(Some(&order_id), job_id.as_ref());
    let released = released_or_error(decision, refs, Pacing::once(&api.policy().poll))?;
    Ok(HttpResponse::Ok().json(SettlementResponse::paid(&released, None)))
}

route!(trusted_mark_paid => Post "/mark_paid" impl JobManagement);
/// Sets a job's `is_paid` flag without a payment. Only reachable under `/internal`, behind the signature check.
pub async fn trusted_mark_paid<B: JobManagement>(
    body: web::Json<TrustedMarkPaidParams>,
    jobs: web::Data<AssetJobApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let job_id = body.into_inner().job_id;
    let job = jobs.mark_paid_trusted(&job_id).await?;
    info!("💻️ Job {job_id} was marked as paid by a trusted caller");
    Ok(HttpResponse::Ok().json(job))
}

//----------------------------------------------   Reconcile  ----------------------------------------------------
route!(reconcile => Post "/reconcile" impl SettlementDatabase, PaymentGatewayClient);
/// Runs one reconciliation sweep now and returns its summary.
pub async fn reconcile<B, G>(
    api: web::Data<ReconciliationApi<B, G>>,
    settings: web::Data<SweepSettings>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: PaymentGatewayClient,
{
    debug!("💻️ On-demand reconciliation sweep requested");
    let summary = api.run_sweep(*settings.get_ref()).await?;
    info!("💻️ On-demand sweep finished. {summary:?}");
    Ok(HttpResponse::Ok().json(summary))
}
