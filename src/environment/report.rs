// src/environment/report.rs
// Replays a client-side probe report as a host environment.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    ConnectionHints, DisplayGeometry, DomProbe, GraphicsInfo, HostCapabilities, HostEnvironment,
    NavigatorInfo, NetworkInfo, PointerActivity, Probe, ProbeError,
};
use crate::store::{InMemoryStore, KeyValueStore, StoreError};

/// How the reported local storage behaved during the client's round-trip probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBehavior {
    #[default]
    Functional,
    /// Reads return something other than what was written.
    Mismatch,
    /// Writes throw.
    Failing,
    /// No storage API at all.
    Missing,
}

/// Store that reproduces the reported storage behaviour.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(from = "StorageBehavior", into = "StorageBehavior")]
pub struct ReplayStorage {
    behavior: StorageBehavior,
    entries: InMemoryStore,
}

impl ReplayStorage {
    pub fn behavior(&self) -> StorageBehavior {
        self.behavior
    }
}

impl From<StorageBehavior> for ReplayStorage {
    fn from(behavior: StorageBehavior) -> Self {
        Self {
            behavior,
            entries: InMemoryStore::default(),
        }
    }
}

impl From<ReplayStorage> for StorageBehavior {
    fn from(storage: ReplayStorage) -> Self {
        storage.behavior
    }
}

impl Clone for ReplayStorage {
    fn clone(&self) -> Self {
        Self::from(self.behavior)
    }
}

impl PartialEq for ReplayStorage {
    fn eq(&self, other: &Self) -> bool {
        self.behavior == other.behavior
    }
}

impl KeyValueStore for ReplayStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.behavior {
            StorageBehavior::Functional => self.entries.get(key),
            StorageBehavior::Mismatch => Ok(self
                .entries
                .get(key)?
                .map(|mut value| {
                    value.reverse();
                    value.push(b'~');
                    value
                })),
            StorageBehavior::Failing | StorageBehavior::Missing => Err(StoreError::Unavailable),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        match self.behavior {
            StorageBehavior::Functional | StorageBehavior::Mismatch => self.entries.set(key, value),
            StorageBehavior::Failing => Err(StoreError::QuotaExceeded),
            StorageBehavior::Missing => Err(StoreError::Unavailable),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.behavior {
            StorageBehavior::Functional | StorageBehavior::Mismatch => self.entries.delete(key),
            StorageBehavior::Failing | StorageBehavior::Missing => Err(StoreError::Unavailable),
        }
    }
}

/// Serialized probe results posted by the client-side probe script.
///
/// Absent measurements make the corresponding probe report `Unavailable`; probes listed
/// in `failed_probes` threw on the client and report `Failed`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct EnvironmentReport {
    pub user_agent: String,
    pub secure: bool,
    pub capabilities: HostCapabilities,
    pub canvas_data_url: Option<String>,
    pub graphics: Option<GraphicsInfo>,
    pub display: DisplayGeometry,
    pub timer_delay_us: Option<u64>,
    pub dom_computed_width: Option<String>,
    pub local_storage: ReplayStorage,
    pub pointer: Option<PointerActivity>,
    pub network: Option<NetworkInfo>,
    pub fetch_ms: Option<f64>,
    pub navigator: NavigatorInfo,
    pub hints: ConnectionHints,
    pub failed_probes: HashSet<Probe>,
}

impl EnvironmentReport {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn mark_failed(&mut self, probe: Probe) {
        self.failed_probes.insert(probe);
    }

    fn check(&self, probe: Probe) -> Result<(), ProbeError> {
        if self.failed_probes.contains(&probe) {
            return Err(ProbeError::Failed(format!("{} probe threw", probe.as_str())));
        }
        Ok(())
    }
}

#[async_trait]
impl HostEnvironment for EnvironmentReport {
    fn user_agent(&self) -> Result<String, ProbeError> {
        self.check(Probe::UserAgent)?;
        Ok(self.user_agent.clone())
    }

    fn capabilities(&self) -> HostCapabilities {
        self.capabilities.clone()
    }

    fn canvas_fingerprint(&self) -> Result<Option<String>, ProbeError> {
        self.check(Probe::Canvas)?;
        Ok(self.canvas_data_url.clone())
    }

    fn graphics_info(&self) -> Result<Option<GraphicsInfo>, ProbeError> {
        self.check(Probe::Graphics)?;
        Ok(self.graphics.clone())
    }

    fn display(&self) -> Result<DisplayGeometry, ProbeError> {
        self.check(Probe::Display)?;
        Ok(self.display)
    }

    async fn measure_delay(&self, _delay: Duration) -> Result<Duration, ProbeError> {
        self.check(Probe::Timer)?;
        self.timer_delay_us
            .map(Duration::from_micros)
            .ok_or(ProbeError::Unavailable)
    }

    fn dom_probe(&self) -> Result<DomProbe, ProbeError> {
        self.check(Probe::Dom)?;
        self.dom_computed_width
            .as_ref()
            .map(|width| DomProbe {
                computed_width: width.clone(),
            })
            .ok_or(ProbeError::Unavailable)
    }

    fn local_storage(&self) -> Result<&dyn KeyValueStore, ProbeError> {
        self.check(Probe::Storage)?;
        if self.local_storage.behavior() == StorageBehavior::Missing {
            return Err(ProbeError::Unavailable);
        }
        Ok(&self.local_storage)
    }

    async fn pointer_activity(&self, _window: Duration) -> Result<PointerActivity, ProbeError> {
        self.check(Probe::Pointer)?;
        self.pointer.ok_or(ProbeError::Unavailable)
    }

    fn network_info(&self) -> Result<Option<NetworkInfo>, ProbeError> {
        self.check(Probe::Network)?;
        Ok(self.network.clone())
    }

    async fn measure_fetch(&self) -> Result<Duration, ProbeError> {
        self.check(Probe::Fetch)?;
        match self.fetch_ms {
            Some(ms) if ms >= 0.0 => Duration::try_from_secs_f64(ms / 1000.0)
                .map_err(|_| ProbeError::Failed("invalid fetch timing".to_string())),
            Some(_) => Err(ProbeError::Failed("invalid fetch timing".to_string())),
            None => Err(ProbeError::Unavailable),
        }
    }

    fn is_secure_transport(&self) -> bool {
        self.secure
    }

    fn navigator(&self) -> Result<NavigatorInfo, ProbeError> {
        self.check(Probe::Navigator)?;
        Ok(self.navigator.clone())
    }

    fn connection_hints(&self) -> ConnectionHints {
        self.hints.clone()
    }
}
