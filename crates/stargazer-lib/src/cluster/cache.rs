//! Short-lived read cache for control-plane lists
//!
//! One cache exists per resource kind; entries are keyed by scope and are
//! independent of each other. A DashMap guard is never held across an await.

use super::Scope;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Default time-to-live for cached lists
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

struct CacheEntry<T> {
    payload: Vec<T>,
    fetched_at: Instant,
}

/// Scope-keyed cache for one resource kind
pub(crate) struct ResourceCache<T> {
    entries: DashMap<Scope, CacheEntry<T>>,
    ttl: Duration,
}

impl<T: Clone> ResourceCache<T> {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cached payload if it was fetched less than one TTL ago
    pub(crate) fn get(&self, scope: &Scope) -> Option<Vec<T>> {
        let entry = self.entries.get(scope)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    /// Store a freshly fetched payload, replacing any previous entry
    pub(crate) fn insert(&self, scope: Scope, payload: Vec<T>) {
        self.entries.insert(
            scope,
            CacheEntry {
                payload,
                fetched_at: Instant::now(),
            },
        );
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
