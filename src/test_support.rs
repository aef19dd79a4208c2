// src/test_support.rs
// Shared fixtures for unit tests: stores, canned environments and stub collectors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::environment::{
    ConnectionType, DisplayGeometry, EnvironmentReport, GraphicsInfo, HostCapabilities,
    HostEnvironment, NavigatorInfo, NetworkInfo, PointerActivity, StorageBehavior,
};
use crate::signals::{Collector, PartialVerdict};
use crate::store::{KeyValueStore, StoreError};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub(crate) fn lock_env() -> MutexGuard<'static, ()> {
    ENV_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Store whose every operation fails.
#[derive(Debug, Default)]
pub(crate) struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Unavailable)
    }

    fn set(&self, _key: &str, _value: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }
}

pub(crate) const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub(crate) fn canvas_data_url() -> String {
    format!("data:image/png;base64,{}", "Qm9va3Mgb24gYSBzaGVsZg".repeat(8))
}

/// A secure desktop browser on wifi that passes every probe.
pub(crate) fn human_report() -> EnvironmentReport {
    EnvironmentReport {
        user_agent: DESKTOP_CHROME_UA.to_string(),
        secure: true,
        capabilities: HostCapabilities {
            probe_cost_us: Some(420),
            ..HostCapabilities::default()
        },
        canvas_data_url: Some(canvas_data_url()),
        graphics: Some(GraphicsInfo {
            vendor: "Google Inc. (Intel)".to_string(),
            renderer: "ANGLE (Intel, Intel(R) UHD Graphics 620 Direct3D11)".to_string(),
        }),
        display: DisplayGeometry {
            inner_width: 1280,
            inner_height: 720,
            outer_width: 1280,
            outer_height: 800,
            screen_width: 1920,
            screen_height: 1080,
        },
        timer_delay_us: Some(1_250),
        dom_computed_width: Some("1px".to_string()),
        pointer: Some(PointerActivity { moves: 6, clicks: 0 }),
        network: Some(NetworkInfo {
            connection_type: Some(ConnectionType::Wifi),
            effective_type: Some("4g".to_string()),
            save_data: false,
        }),
        navigator: NavigatorInfo {
            device_memory_gb: Some(8.0),
            hardware_concurrency: Some(8),
            service_worker: true,
            languages: vec!["en-GB".to_string(), "en".to_string()],
            language: Some("en-GB".to_string()),
            cookie_enabled: true,
        },
        ..EnvironmentReport::default()
    }
}

/// An insecure headless automation stack failing most probes.
pub(crate) fn headless_report() -> EnvironmentReport {
    EnvironmentReport {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) HeadlessChrome/120.0 scraper".to_string(),
        secure: false,
        capabilities: HostCapabilities {
            session_storage: false,
            probe_cost_us: Some(10),
            ..HostCapabilities::default()
        },
        canvas_data_url: Some("data:,".to_string()),
        graphics: Some(GraphicsInfo {
            vendor: "Brian Paul".to_string(),
            renderer: "Google SwiftShader".to_string(),
        }),
        display: DisplayGeometry {
            inner_width: 800,
            inner_height: 600,
            outer_width: 800,
            outer_height: 600,
            screen_width: 800,
            screen_height: 600,
        },
        dom_computed_width: Some("auto".to_string()),
        local_storage: StorageBehavior::Failing.into(),
        fetch_ms: Some(900.0),
        navigator: NavigatorInfo {
            hardware_concurrency: Some(1),
            ..NavigatorInfo::default()
        },
        ..EnvironmentReport::default()
    }
}

/// Always returns the same verdict.
pub(crate) struct FixedCollector {
    pub id: &'static str,
    pub verdict: PartialVerdict,
}

impl FixedCollector {
    pub(crate) fn scored(id: &'static str, score: f64, confidence: f64) -> Self {
        Self {
            id,
            verdict: PartialVerdict::scored(score, confidence, id),
        }
    }
}

#[async_trait]
impl Collector for FixedCollector {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn collect(&self, _env: &dyn HostEnvironment) -> PartialVerdict {
        self.verdict.clone()
    }
}

/// Counts invocations, then returns a clean verdict after `delay`.
pub(crate) struct CountingCollector {
    pub calls: Arc<AtomicUsize>,
    pub delay: Duration,
}

impl CountingCollector {
    pub(crate) fn new(calls: Arc<AtomicUsize>) -> Self {
        Self {
            calls,
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl Collector for CountingCollector {
    fn id(&self) -> &'static str {
        "counting"
    }

    async fn collect(&self, _env: &dyn HostEnvironment) -> PartialVerdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        PartialVerdict::scored(0.0, 0.5, "counting")
    }
}

/// Never completes.
pub(crate) struct PendingCollector;

#[async_trait]
impl Collector for PendingCollector {
    fn id(&self) -> &'static str {
        "pending"
    }

    async fn collect(&self, _env: &dyn HostEnvironment) -> PartialVerdict {
        std::future::pending::<()>().await;
        PartialVerdict::abstain("pending")
    }
}

pub(crate) struct PanickingCollector;

#[async_trait]
impl Collector for PanickingCollector {
    fn id(&self) -> &'static str {
        "panicking"
    }

    async fn collect(&self, _env: &dyn HostEnvironment) -> PartialVerdict {
        panic!("probe exploded");
    }
}
