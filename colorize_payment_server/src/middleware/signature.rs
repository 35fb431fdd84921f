//! Signed requests for the `/internal` routes.
//!
//! Trusted callers (the processing pipeline, the ops scheduler) sign the raw request body with HMAC-SHA256, keyed
//! with `CPG_INTERNAL_SECRET`, and send the base64-encoded signature in the `X-Cpg-Signature` header.
//!
//! With no secret configured, every request is turned away.
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    http::{header::HeaderMap, StatusCode},
    web::Bytes,
    Error,
    ResponseError,
};
use cpg_common::Secret;
use futures::future::LocalBoxFuture;
use log::{trace, warn};

use crate::helpers::verify_hmac;

pub const SIGNATURE_HEADER: &str = "X-Cpg-Signature";

/// Why a request to an internal route was turned away. All of them are answered with 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureRejection {
    #[error("Internal endpoints are disabled.")]
    Disabled,
    #[error("No HMAC signature found.")]
    Missing,
    #[error("Invalid HMAC signature.")]
    Invalid,
}

impl ResponseError for SignatureRejection {
    fn status_code(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }
}

/// The secret and the header the signature travels in.
pub struct SignatureGuard {
    header: String,
    secret: Secret<String>,
}

impl SignatureGuard {
    pub fn new(header: &str, secret: Secret<String>) -> Self {
        Self { header: header.to_string(), secret }
    }

    /// The signature a request presents. Checked before the body is read, so unsigned requests are cheap to refuse.
    pub fn presented_signature(&self, headers: &HeaderMap) -> Result<String, SignatureRejection> {
        if self.secret.is_empty() {
            return Err(SignatureRejection::Disabled);
        }
        headers
            .get(self.header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or(SignatureRejection::Missing)
    }

    pub fn verify(&self, signature: &str, body: &[u8]) -> Result<(), SignatureRejection> {
        if verify_hmac(self.secret.reveal(), body, signature) {
            Ok(())
        } else {
            Err(SignatureRejection::Invalid)
        }
    }
}

/// Wrap a scope with this to require a valid body signature on every request in it.
pub struct RequireSignature {
    guard: Rc<SignatureGuard>,
}

impl RequireSignature {
    pub fn new(header: &str, secret: Secret<String>) -> Self {
        Self { guard: Rc::new(SignatureGuard::new(header, secret)) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireSignature
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = RequireSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireSignatureService { guard: Rc::clone(&self.guard), service: Rc::new(service) }))
    }
}

pub struct RequireSignatureService<S> {
    guard: Rc<SignatureGuard>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let guard = Rc::clone(&self.guard);
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let path = req.path().to_string();
            let signature = guard.presented_signature(req.headers()).map_err(|e| {
                warn!("🔐️ Refusing request to {path}. {e}");
                e
            })?;
            let body = req.extract::<Bytes>().await.map_err(|e| {
                warn!("🔐️ Could not read the body of a request to {path}. {e:?}");
                ErrorBadRequest("Failed to extract request data.")
            })?;
            guard.verify(&signature, &body).map_err(|e| {
                warn!("🔐️ Refusing request to {path}. {e}");
                e
            })?;
            trace!("🔐️ Signature for {path} ✅️");
            req.set_payload(replay(body));
            service.call(req).await
        })
    }
}

/// Puts a body that has already been read back in place for the handler.
fn replay(body: Bytes) -> Payload {
    let (_, mut payload) = h1::Payload::create(true);
    payload.unread_data(body);
    Payload::from(payload)
}
