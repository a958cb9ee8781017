use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Polling of asynchronous job status
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    /// Wait between two status queries, e.g. "500ms"
    #[serde(default = "default_interval", deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

const fn default_interval() -> Duration {
    Duration::from_millis(500)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    duration_str::parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
}
