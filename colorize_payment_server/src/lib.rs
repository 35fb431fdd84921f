//! # Colorize payment server
//! This crate hosts the HTTP entry points of the colorize payment gateway. It is responsible for:
//! * Creating orders and gateway checkout sessions for customers who want to buy a colorized image.
//! * Releasing paid assets, and telling everyone else whether to wait, pay again or contact support.
//! * Running the reconciliation sweep on a timer, and on demand for trusted callers.
//! * Forwarding paid orders to the conversion-tracking endpoint.
//!
//! Every payment decision is made by [`colorize_payment_engine::SettlementApi`]. The handlers in this crate only turn
//! a [`colorize_payment_engine::Decision`] into an HTTP response.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/checkout`: Creates an order and a gateway checkout session.
//! * `/download/{job_id}`: Streams the result of a paid asset job.
//! * `/payment/verify`: Polled by the payment success page.
//! * `/payment/status/{order_id}`: The stored state of an order.
//! * `/payment/mark_paid`: Unlocks a job after full payment verification.
//! * `/internal/mark_paid` and `/internal/reconcile`: Signed, machine-to-machine calls.

pub mod cli;
pub mod config;
pub mod errors;

pub mod asset_release;
pub mod data_objects;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod reconciliation_worker;
pub mod routes;
pub mod server;
