use std::time::Duration;

use cpg_common::PaymentObservation;

use crate::db_types::OrderId;

/// A short-lived memo of gateway observations.
///
/// The cache holds no durability guarantee. A restart, a second instance or an eviction simply means a miss, and the
/// settlement engine must behave correctly with a cold (or absent) cache.
pub trait StatusCache: Send + Sync {
    fn get(&self, order_id: &OrderId) -> Option<PaymentObservation>;

    fn put(&self, order_id: &OrderId, observation: PaymentObservation, ttl: Duration);

    fn expire(&self, order_id: &OrderId);
}
