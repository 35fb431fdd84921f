//! Implementations of [`StatusCache`](crate::traits::StatusCache).
//!
//! * [`MemoryStatusCache`] is a process-local TTL map.
//! * [`NoStatusCache`] never remembers anything. Useful when running several instances, or in tests.
mod memory;

pub use memory::MemoryStatusCache;

use std::time::Duration;

use cpg_common::PaymentObservation;

use crate::{db_types::OrderId, traits::StatusCache};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoStatusCache;

impl StatusCache for NoStatusCache {
    fn get(&self, _order_id: &OrderId) -> Option<PaymentObservation> {
        None
    }

    fn put(&self, _order_id: &OrderId, _observation: PaymentObservation, _ttl: Duration) {}

    fn expire(&self, _order_id: &OrderId) {}
}
