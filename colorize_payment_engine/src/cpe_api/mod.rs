//! # Colorize payment engine public API
//!
//! The `cpe_api` module exposes the programmatic API of the payment engine. Each API is created by supplying a
//! backend that implements the traits it needs, so callers pick only the functionality they use.
//!
//! * [`settlement_api`] is the single authority on whether an order is paid. Its `resolve` method is what every entry
//!   point calls.
//! * [`reconciliation_api`] is the periodic backstop. It re-resolves stale `Pending` orders and heals paid orders whose
//!   asset job was never unlocked.
//! * [`order_flow_api`] records checkout intents and the gateway's order reference.
//! * [`asset_job_api`] records processing jobs and holds the trusted mark-paid path.
//! * [`polling`] is the client-side success-page loop, modelled as a pure state machine.
//! * [`retry`] holds the backoff schedules shared by all of the above.
//!
//! ```rust,ignore
//! use colorize_payment_engine::{MemoryStatusCache, SettlementApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/colorize_store.db", 25).await?;
//! let api = SettlementApi::new(db, gateway, Arc::new(MemoryStatusCache::default()), producers);
//! let decision = api.resolve(Some(&order_id), Some(&job_id)).await?;
//! ```
pub mod asset_job_api;
pub mod errors;
pub mod order_flow_api;
pub mod polling;
pub mod reconciliation_api;
pub mod retry;
pub mod settlement_api;
pub mod settlement_objects;
