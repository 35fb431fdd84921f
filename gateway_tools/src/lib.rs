//! # Gateway tools
//!
//! A thin client for the external payment gateway. It does two things:
//! * creates checkout sessions for new orders ([`GatewayApi::create_checkout`]), and
//! * performs a single, authoritative status query for an order ([`GatewayApi::query_status`]).
//!
//! The client never retries and never invents a status. Retry policy belongs to the caller.
mod api;
mod config;
mod error;

mod data_objects;
pub mod helpers;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use data_objects::{CheckoutRequest, CheckoutSession, CustomerDetails, GatewayOrder, GatewayPayment};
pub use error::GatewayApiError;
