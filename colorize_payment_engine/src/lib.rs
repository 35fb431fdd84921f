//! Colorize Payment Engine
//!
//! This library decides, under partial failure and with several concurrent callers, whether a purchase has been paid
//! and therefore whether the colorized (or upscaled) image it unlocks may be released.
//!
//! The library is divided into the following sections:
//! 1. Storage ([`mod@sqlite`] and [`mod@traits`]). Orders, their SUCCESS transactions and the asset jobs they unlock
//!    live in SQLite. The engine itself only depends on the backend traits, so another backend can be dropped in.
//! 2. The gateway seam ([`traits::PaymentGatewayClient`]). The engine never talks HTTP; whoever builds the engine
//!    supplies a client that performs one status query per call.
//! 3. The status cache ([`mod@cache`]). A per-process memo of terminal gateway outcomes. It is an optimisation
//!    only.
//! 4. The public API ([`mod@cpe_api`]). [`SettlementApi::resolve`] is the single authority on payment state. Every
//!    entry point (download, success page, mark-paid, reconciliation sweep) goes through it.
//!
//! The engine publishes [`events::OrderPaidEvent`] and [`events::OrderFailedEvent`] through a small pub-sub hook
//! system, so that secondary effects such as conversion tracking can never block or fail a settlement.
pub mod cache;
pub mod cpe_api;
pub mod db_types;
pub mod events;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use cache::{MemoryStatusCache, NoStatusCache};
pub use cpe_api::{
    asset_job_api::AssetJobApi,
    errors::{AssetJobError, OrderFlowError, SettlementError},
    order_flow_api::OrderFlowApi,
    reconciliation_api::{ReconciliationApi, SweepSettings, SweepSummary},
    settlement_api::SettlementApi,
    settlement_objects::{Decision, DecisionCode},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{JobManagement, OrderManagement, PaymentGatewayClient, SettlementDatabase, StatusCache};
