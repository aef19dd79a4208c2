// src/lib.rs
// Visitor gate: scores how bot-like a visitor's browser looks and routes it to the bot
// page, a human challenge or the gated content.

pub mod cache;       // Short-lived verification marker
pub mod challenge;   // Text challenge widget and gateway binding
pub mod config;      // Thresholds, timeouts and profiles
pub mod detection;   // Confidence-weighted aggregation under a global timeout
pub mod environment; // Host probes and replayed client reports
pub mod routing;     // Routing state machine and async gateway
pub mod signals;     // Independent bot-likelihood collectors
pub mod store;       // Key-value storage seam
pub mod test_mode;   // Simulated connection scenarios
pub mod trust;       // Connection trust evaluation

#[cfg(test)]
mod test_support;

pub use config::{DeploymentProfile, GateConfig};
pub use detection::{Aggregator, DetectionError, DetectionResult};
pub use environment::{EnvironmentReport, HostEnvironment};
pub use routing::{Destination, Gateway, RoutingState};
pub use signals::{Collector, PartialVerdict};
pub use store::{InMemoryStore, KeyValueStore};
pub use trust::{ConnectionTrust, TrustEvaluator};
