// src/signals/storage.rs
// Persistent storage round-trip: write a random value, read it back, delete it.

use async_trait::async_trait;
use rand::Rng;

use super::{Collector, PartialVerdict};
use crate::environment::HostEnvironment;
use crate::store::{KeyValueStore, StoreError};

pub const PROBE_KEY: &str = "bot-detection-test";

/// Returns whether the value read back matches the value written.
pub fn round_trip(store: &dyn KeyValueStore, value: &str) -> Result<bool, StoreError> {
    store.set(PROBE_KEY, value.as_bytes())?;
    let retrieved = store.get(PROBE_KEY)?;
    store.delete(PROBE_KEY)?;
    Ok(retrieved.as_deref() == Some(value.as_bytes()))
}

pub struct StorageCollector;

#[async_trait]
impl Collector for StorageCollector {
    fn id(&self) -> &'static str {
        "local-storage"
    }

    async fn collect(&self, env: &dyn HostEnvironment) -> PartialVerdict {
        let value = rand::thread_rng().gen::<u64>().to_string();
        let outcome = env
            .local_storage()
            .map_err(|err| err.to_string())
            .and_then(|store| round_trip(store, &value).map_err(|err| err.to_string()));

        match outcome {
            Ok(true) => PartialVerdict::scored(0.0, 0.5, "local-storage"),
            Ok(false) => PartialVerdict::scored(0.3, 0.5, "local-storage")
                .with_reason("Local storage not functioning properly"),
            Err(err) => {
                tracing::debug!(error = %err, "local storage probe failed");
                PartialVerdict::scored(0.4, 0.4, "local-storage-error")
                    .with_reason("Local storage test failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::round_trip;
    use crate::environment::{ReplayStorage, StorageBehavior};
    use crate::store::{InMemoryStore, StoreError};

    #[test]
    fn working_store_round_trips_and_leaves_nothing_behind() {
        let store = InMemoryStore::new();
        assert_eq!(round_trip(&store, "0.123"), Ok(true));
        assert!(store.is_empty());
    }

    #[test]
    fn mismatching_store_is_detected() {
        let store = ReplayStorage::from(StorageBehavior::Mismatch);
        assert_eq!(round_trip(&store, "0.123"), Ok(false));
    }

    #[test]
    fn failing_store_surfaces_error() {
        let store = ReplayStorage::from(StorageBehavior::Failing);
        assert_eq!(round_trip(&store, "0.123"), Err(StoreError::QuotaExceeded));
    }
}
