use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Least-recently-used cache whose entries also expire.
///
/// Expired entries are dropped when they are read; capacity overflow evicts
/// the least recently used entry.
pub struct Tlru<V> {
    lru: LruCache<String, Entry<V>>,
}

impl<V: Clone> Tlru<V> {
    pub fn new(capacity: usize) -> Self {
        Tlru {
            lru: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.lru.get(key) {
            None => return None,
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
        };
        if expired {
            self.lru.pop(key);
        }
        None
    }

    pub fn set(&mut self, key: String, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.lru.put(key, Entry { value, expires_at });
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lru.len()
    }
}
