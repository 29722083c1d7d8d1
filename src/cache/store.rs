//! Expiring key-value store primitive
//!
//! Bounded map with FIFO insertion order: overflow evicts the oldest entry,
//! and reads past the TTL behave as if the entry never existed. Expired
//! entries are purged lazily on access.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct StoredEntry<V> {
    value: V,
    inserted_at: Instant,
}

pub(crate) struct StoreInner<V> {
    entries: HashMap<String, StoredEntry<V>>,
    /// Insertion order, oldest first; drives overflow eviction
    order: VecDeque<String>,
    capacity: usize,
    ttl: Duration,
}

impl<V> StoreInner<V> {
    fn expired(&self, entry: &StoredEntry<V>) -> bool {
        entry.inserted_at.elapsed() >= self.ttl
    }

    pub(crate) fn get(&mut self, key: &str) -> Option<&V> {
        let expired = match self.entries.get(key) {
            Some(entry) => self.expired(entry),
            None => return None,
        };
        if expired {
            self.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| &e.value)
    }

    pub(crate) fn set(&mut self, key: String, value: V) {
        if self.entries.remove(&key).is_some() {
            self.order.retain(|k| k != &key);
        }
        self.entries.insert(
            key.clone(),
            StoredEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
        self.order.push_back(key);

        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Thread-safe expiring store
pub struct TtlStore<V> {
    inner: Mutex<StoreInner<V>>,
}

impl<V: Clone> TtlStore<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
                ttl,
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: String, value: V) {
        self.lock().set(key, value);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock the underlying map. Used by the cache manager when two
    /// partitions must change under the same critical section.
    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreInner<V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
