use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use log::warn;

/// A bounded, FIFO-evicting set of recently seen event ids.
///
/// Payment processors redeliver webhook events, so the reconciler checks each event id against this
/// cache before doing any work. The cache is a cheap first line of defence only; the database-level
/// state guards are what actually make event handling idempotent, so losing the cache on restart is
/// harmless.
#[derive(Clone)]
pub struct RecentEventCache {
    inner: Arc<Mutex<CacheInner>>,
    capacity: usize,
}

struct CacheInner {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl RecentEventCache {
    pub fn new(capacity: usize) -> Self {
        let inner = CacheInner { seen: HashSet::with_capacity(capacity), order: VecDeque::with_capacity(capacity) };
        Self { inner: Arc::new(Mutex::new(inner)), capacity }
    }

    /// Records the id and reports whether it had been seen before. Returns `true` for a duplicate.
    pub fn observe(&self, id: &str) -> bool {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("📬️ Event cache mutex was poisoned. Continuing with the recovered guard.");
                poisoned.into_inner()
            },
        };
        if inner.seen.contains(id) {
            return true;
        }
        if inner.order.len() >= self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.seen.remove(&evicted);
            }
        }
        inner.seen.insert(id.to_string());
        inner.order.push_back(id.to_string());
        false
    }
}

impl Default for RecentEventCache {
    fn default() -> Self {
        Self::new(512)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_observation_is_not_a_duplicate() {
        let cache = RecentEventCache::new(4);
        assert!(!cache.observe("evt_1"));
        assert!(cache.observe("evt_1"));
    }

    #[test]
    fn evicts_oldest_when_full() {
        let cache = RecentEventCache::new(2);
        assert!(!cache.observe("a"));
        assert!(!cache.observe("b"));
        assert!(!cache.observe("c"));
        // "a" was evicted, so it reads as fresh again
        assert!(!cache.observe("a"));
        // "c" is still resident
        assert!(cache.observe("c"));
    }

    #[test]
    fn clones_share_state() {
        let cache = RecentEventCache::new(8);
        let clone = cache.clone();
        assert!(!cache.observe("evt_9"));
        assert!(clone.observe("evt_9"));
    }
}
