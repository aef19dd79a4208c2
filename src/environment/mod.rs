// src/environment/mod.rs
// The visitor's browser as seen by the gate. Every probe a collector or the trust
// evaluator needs goes through `HostEnvironment`, so a live embedding and a replayed
// client report look identical to the engine.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::KeyValueStore;

mod report;

pub use report::{EnvironmentReport, ReplayStorage, StorageBehavior};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("probe unavailable in this host")]
    Unavailable,
    #[error("probe failed: {0}")]
    Failed(String),
}

/// Probe names, used by reports to mark probes that threw on the client.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    UserAgent,
    Canvas,
    Graphics,
    Display,
    Timer,
    Dom,
    Storage,
    Pointer,
    Network,
    Fetch,
    Navigator,
}

impl Probe {
    pub fn as_str(self) -> &'static str {
        match self {
            Probe::UserAgent => "user_agent",
            Probe::Canvas => "canvas",
            Probe::Graphics => "graphics",
            Probe::Display => "display",
            Probe::Timer => "timer",
            Probe::Dom => "dom",
            Probe::Storage => "storage",
            Probe::Pointer => "pointer",
            Probe::Network => "network",
            Probe::Fetch => "fetch",
            Probe::Navigator => "navigator",
        }
    }
}

/// Host APIs a real browser page is expected to expose.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HostCapabilities {
    pub window: bool,
    pub document: bool,
    pub local_storage: bool,
    pub session_storage: bool,
    pub timers: bool,
    pub randomness: bool,
    /// Wall-clock cost of the capability probe on the host, when it was measured.
    pub probe_cost_us: Option<u64>,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            window: true,
            document: true,
            local_storage: true,
            session_storage: true,
            timers: true,
            randomness: true,
            probe_cost_us: None,
        }
    }
}

impl HostCapabilities {
    pub fn missing_count(&self) -> usize {
        [
            self.window,
            self.document,
            self.local_storage,
            self.session_storage,
            self.timers,
            self.randomness,
        ]
        .iter()
        .filter(|present| !**present)
        .count()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphicsInfo {
    pub vendor: String,
    pub renderer: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DisplayGeometry {
    pub inner_width: u32,
    pub inner_height: u32,
    pub outer_width: u32,
    pub outer_height: u32,
    pub screen_width: u32,
    pub screen_height: u32,
}

/// Outcome of attaching a 1px wide throwaway element and reading its computed style.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DomProbe {
    pub computed_width: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PointerActivity {
    pub moves: u32,
    pub clicks: u32,
}

impl PointerActivity {
    pub fn is_idle(&self) -> bool {
        self.moves == 0 && self.clicks == 0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Wifi,
    Ethernet,
    Cellular,
    Bluetooth,
    Wimax,
    None,
    Unknown,
    #[serde(other)]
    Other,
}

/// Network Information API view of the link, when the browser exposes it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct NetworkInfo {
    pub connection_type: Option<ConnectionType>,
    /// `slow-2g`, `2g`, `3g`, `4g` or `5g`.
    pub effective_type: Option<String>,
    pub save_data: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct NavigatorInfo {
    pub device_memory_gb: Option<f64>,
    pub hardware_concurrency: Option<u32>,
    pub service_worker: bool,
    pub languages: Vec<String>,
    pub language: Option<String>,
    pub cookie_enabled: bool,
}

/// Connection-origin indicators declared by the host or an upstream edge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ConnectionHints {
    pub client_ip: Option<IpAddr>,
    pub vpn: bool,
    pub tor: bool,
    pub datacenter: bool,
    pub proxy: bool,
    pub via_header: bool,
    pub forwarded_hops: u8,
}

#[async_trait]
pub trait HostEnvironment: Send + Sync {
    fn user_agent(&self) -> Result<String, ProbeError>;

    fn capabilities(&self) -> HostCapabilities;

    /// Data URL of the offscreen 2D drawing; `None` when no 2D context exists.
    fn canvas_fingerprint(&self) -> Result<Option<String>, ProbeError>;

    /// 3D context vendor/renderer; `None` when no 3D context exists.
    fn graphics_info(&self) -> Result<Option<GraphicsInfo>, ProbeError>;

    fn display(&self) -> Result<DisplayGeometry, ProbeError>;

    /// Wall-clock cost of awaiting a `delay` timer.
    async fn measure_delay(&self, delay: Duration) -> Result<Duration, ProbeError> {
        let start = tokio::time::Instant::now();
        tokio::time::sleep(delay).await;
        Ok(start.elapsed())
    }

    fn dom_probe(&self) -> Result<DomProbe, ProbeError>;

    fn local_storage(&self) -> Result<&dyn KeyValueStore, ProbeError>;

    /// Counts pointer movement and clicks over `window`.
    async fn pointer_activity(&self, window: Duration) -> Result<PointerActivity, ProbeError>;

    fn network_info(&self) -> Result<Option<NetworkInfo>, ProbeError>;

    /// Time taken to fetch a tiny resource; used when `network_info` is absent.
    async fn measure_fetch(&self) -> Result<Duration, ProbeError>;

    fn is_secure_transport(&self) -> bool;

    fn navigator(&self) -> Result<NavigatorInfo, ProbeError>;

    fn connection_hints(&self) -> ConnectionHints {
        ConnectionHints::default()
    }
}
