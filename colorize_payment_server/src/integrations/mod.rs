//! Adapters between the payment engine and the outside world.
//!
//! * [`gateway`] plugs the gateway REST client into the engine, and creates checkout sessions.
//! * [`asset_store`] fetches finished images from object storage.
//! * [`analytics`] forwards paid orders to the conversion-tracking endpoint.
pub mod analytics;
pub mod asset_store;
pub mod gateway;
