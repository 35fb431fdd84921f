//! # Backend contracts
//!
//! This module defines the behaviour that backends need to expose in order to be driven by the settlement engine.
//!
//! * [`OrderManagement`] stores purchase intents (orders) and their SUCCESS transactions.
//! * [`JobManagement`] stores asset jobs and their monotonic `is_paid` flag.
//! * [`SettlementDatabase`] is the highest level of behaviour. It adds the two atomic state transitions the engine
//!   relies on: settling an order as paid, and marking it failed.
//! * [`PaymentGatewayClient`] is the engine's only view of the external payment gateway.
//! * [`StatusCache`] is an injectable, best-effort memo of terminal gateway outcomes.
mod gateway_client;
mod job_management;
mod order_management;
mod settlement_database;
mod status_cache;

mod data_objects;

pub use data_objects::{FailOutcome, InsertOrderResult, SettlementResult};
pub use gateway_client::{GatewayError, PaymentGatewayClient};
pub use job_management::JobManagement;
pub use order_management::OrderManagement;
pub use settlement_database::{SettlementDatabase, SettlementDatabaseError};
pub use status_cache::StatusCache;
