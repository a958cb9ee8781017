#![allow(clippy::must_use_candidate)]

mod env;
mod loader;
pub mod poller;
pub mod providers;
pub mod server;
pub mod telemetry;

use serde::Deserialize;
use zoo_core::ModelDescriptor;

pub use poller::*;
pub use providers::*;
pub use server::*;
pub use telemetry::{ExportProtocol, ExporterConfig, TelemetryConfig};

/// Top-level Zoo configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Image provider credentials and endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Job status polling for asynchronous providers
    #[serde(default)]
    pub poller: PollerConfig,
    /// Model catalog offered for selection
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}

impl Config {
    /// Look up a catalog model by display name
    pub fn model(&self, name: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Models flagged as selected by default
    pub fn default_models(&self) -> Vec<ModelDescriptor> {
        self.models.iter().filter(|m| m.checked).cloned().collect()
    }
}
