//! In-process cache for decrypted credentials.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;

#[derive(Debug, Clone)]
struct CachedSecret {
    value: String,
    expires_at: Instant,
}

/// Concurrent map of credential key -> plaintext with a fixed TTL.
///
/// Every invalidation bumps a generation counter. A value loaded from the
/// store is only cached if no invalidation happened while it was loading.
#[derive(Debug)]
pub struct CredentialCache {
    entries: DashMap<String, CachedSecret>,
    ttl: Duration,
    generation: RwLock<u64>,
}

impl CredentialCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            generation: RwLock::new(0),
        }
    }

    /// Cached value, if present and not expired. Expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn insert(&self, key: &str, value: String) {
        self.entries.insert(
            key.to_string(),
            CachedSecret {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Read before loading a value; hand it to `insert_if_current`.
    pub fn generation(&self) -> u64 {
        *self.generation.read()
    }

    /// Cache a loaded value unless anything was invalidated since
    /// `generation`. Returns whether the value was stored.
    pub fn insert_if_current(&self, key: &str, value: String, generation: u64) -> bool {
        // Held across the insert so a concurrent invalidation runs after it.
        let current = self.generation.read();
        if *current != generation {
            return false;
        }
        self.insert(key, value);
        true
    }

    pub fn invalidate(&self, key: &str) {
        *self.generation.write() += 1;
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        *self.generation.write() += 1;
        self.entries.clear();
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_then_invalidate() {
        let cache = CredentialCache::new(Duration::from_secs(300));
        cache.insert("stripe.secret_key", "sk_test".into());
        assert_eq!(cache.get("stripe.secret_key").as_deref(), Some("sk_test"));

        cache.invalidate("stripe.secret_key");
        assert_eq!(cache.get("stripe.secret_key"), None);
    }

    #[test]
    fn test_entries_expire() {
        let cache = CredentialCache::new(Duration::from_millis(20));
        cache.insert("paypal.client_id", "abc".into());
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get("paypal.client_id"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_started_before_invalidation_is_not_cached() {
        let cache = CredentialCache::new(Duration::from_secs(300));
        let generation = cache.generation();

        cache.invalidate("stripe.secret_key");

        assert!(!cache.insert_if_current("stripe.secret_key", "stale".into(), generation));
        assert_eq!(cache.get("stripe.secret_key"), None);
        assert!(cache.insert_if_current("stripe.secret_key", "fresh".into(), cache.generation()));
        assert_eq!(cache.get("stripe.secret_key").as_deref(), Some("fresh"));
    }

    #[test]
    fn test_purge_expired() {
        let cache = CredentialCache::new(Duration::ZERO);
        cache.insert("a", "1".into());
        cache.insert("b", "2".into());
        assert_eq!(cache.purge_expired(), 2);
    }
}
