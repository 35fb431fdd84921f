use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use cpg_common::PaymentObservation;
use log::*;
use parking_lot::RwLock;

use crate::{db_types::OrderId, traits::StatusCache};

const DEFAULT_MAX_ENTRIES: usize = 10_000;

struct CacheEntry {
    observation: PaymentObservation,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// An in-memory, per-process [`StatusCache`]. Expired entries are dropped lazily whenever the map grows past its
/// soft capacity.
pub struct MemoryStatusCache {
    entries: RwLock<HashMap<OrderId, CacheEntry>>,
    max_entries: usize,
}

impl Default for MemoryStatusCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryStatusCache {
    pub fn new(max_entries: usize) -> Self {
        Self { entries: RwLock::new(HashMap::new()), max_entries }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(entries: &mut HashMap<OrderId, CacheEntry>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        trace!("🧊️ Purged {} expired status cache entries", before - entries.len());
    }
}

impl StatusCache for MemoryStatusCache {
    fn get(&self, order_id: &OrderId) -> Option<PaymentObservation> {
        let now = Instant::now();
        let entries = self.entries.read();
        let hit = entries.get(order_id).filter(|e| e.is_live(now)).map(|e| e.observation.clone());
        trace!("🧊️ Status cache {} for {order_id}", if hit.is_some() { "hit" } else { "miss" });
        hit
    }

    fn put(&self, order_id: &OrderId, observation: PaymentObservation, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries {
            Self::purge_expired(&mut entries, now);
        }
        if entries.len() >= self.max_entries && !entries.contains_key(order_id) {
            warn!("🧊️ Status cache is full ({} entries). Not caching {order_id}.", entries.len());
            return;
        }
        trace!("🧊️ Caching {} for {order_id} for {}ms", observation.outcome, ttl.as_millis());
        entries.insert(order_id.clone(), CacheEntry { observation, expires_at: now + ttl });
    }

    fn expire(&self, order_id: &OrderId) {
        if self.entries.write().remove(order_id).is_some() {
            trace!("🧊️ Expired status cache entry for {order_id}");
        }
    }
}
