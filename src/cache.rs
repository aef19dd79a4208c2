// src/cache.rs
// Short-lived "this visitor already proved human" marker. Storage trouble never
// surfaces: the cache just behaves as empty.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::store::KeyValueStore;

pub const VERIFICATION_KEY: &str = "bot-detection-verified";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationEntry {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub verified: bool,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

pub struct VerificationCache<'a> {
    store: &'a dyn KeyValueStore,
    enabled: bool,
    expiry: Duration,
}

impl<'a> VerificationCache<'a> {
    pub fn new(store: &'a dyn KeyValueStore, enabled: bool, expiry: Duration) -> Self {
        Self {
            store,
            enabled,
            expiry,
        }
    }

    pub fn from_config(store: &'a dyn KeyValueStore, config: &GateConfig) -> Self {
        Self::new(store, config.enable_caching, config.cache_expiry())
    }

    pub fn read(&self) -> bool {
        self.read_at(now_ms())
    }

    /// True only for a fresh, well-formed, verified entry. Expired entries are removed.
    pub fn read_at(&self, now_ms: u64) -> bool {
        if !self.enabled {
            return false;
        }

        let raw = match self.store.get(VERIFICATION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(err) => {
                tracing::debug!(error = %err, "verification cache read failed");
                return false;
            }
        };

        let entry: VerificationEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "ignoring malformed verification entry");
                return false;
            }
        };

        let age = now_ms.saturating_sub(entry.timestamp);
        if u128::from(age) >= self.expiry.as_millis() {
            if let Err(err) = self.store.delete(VERIFICATION_KEY) {
                tracing::debug!(error = %err, "failed to drop expired verification entry");
            }
            return false;
        }

        entry.verified
    }

    pub fn write(&self, verified: bool) {
        self.write_at(verified, now_ms());
    }

    pub fn write_at(&self, verified: bool, now_ms: u64) {
        if !self.enabled {
            return;
        }
        let entry = VerificationEntry {
            timestamp: now_ms,
            verified,
        };
        let encoded = match serde_json::to_vec(&entry) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::debug!(error = %err, "failed to encode verification entry");
                return;
            }
        };
        if let Err(err) = self.store.set(VERIFICATION_KEY, &encoded) {
            tracing::debug!(error = %err, "verification cache write failed");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.store.delete(VERIFICATION_KEY) {
            tracing::debug!(error = %err, "verification cache clear failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::test_support::FailingStore;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn written_entry_reads_back_within_expiry() {
        let store = InMemoryStore::new();
        let cache = VerificationCache::new(&store, true, DAY);
        cache.write_at(true, 1_000);
        assert!(cache.read_at(1_000 + 60_000));
    }

    #[test]
    fn expired_entry_reads_false_and_is_removed() {
        let store = InMemoryStore::new();
        let cache = VerificationCache::new(&store, true, DAY);
        cache.write_at(true, 1_000);
        assert!(!cache.read_at(1_000 + DAY.as_millis() as u64));
        assert_eq!(store.get(VERIFICATION_KEY), Ok(None));
    }

    #[test]
    fn unverified_entry_is_a_miss() {
        let store = InMemoryStore::new();
        let cache = VerificationCache::new(&store, true, DAY);
        cache.write_at(false, 5);
        assert!(!cache.read_at(10));
    }

    #[test]
    fn malformed_entry_is_treated_as_absent() {
        let store = InMemoryStore::new();
        store.set(VERIFICATION_KEY, b"{\"verified\":").unwrap();
        let cache = VerificationCache::new(&store, true, DAY);
        assert!(!cache.read());
    }

    #[test]
    fn entry_format_matches_the_stored_json() {
        let store = InMemoryStore::new();
        VerificationCache::new(&store, true, DAY).write_at(true, 1_700_000_000_000);
        let raw = store.get(VERIFICATION_KEY).unwrap().unwrap();
        assert_eq!(
            String::from_utf8(raw).unwrap(),
            r#"{"timestamp":1700000000000,"verified":true}"#
        );
    }

    #[test]
    fn disabled_cache_never_reads_or_writes() {
        let store = InMemoryStore::new();
        let cache = VerificationCache::new(&store, false, DAY);
        cache.write(true);
        assert!(store.is_empty());

        VerificationCache::new(&store, true, DAY).write(true);
        assert!(!cache.read());
    }

    #[test]
    fn storage_failures_are_swallowed() {
        let cache = VerificationCache::new(&FailingStore, true, DAY);
        cache.write(true);
        cache.clear();
        assert!(!cache.read());
    }

    #[test]
    fn clear_removes_the_entry() {
        let store = InMemoryStore::new();
        let cache = VerificationCache::new(&store, true, DAY);
        cache.write(true);
        cache.clear();
        assert!(!cache.read());
    }
}
