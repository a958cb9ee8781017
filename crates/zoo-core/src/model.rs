use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

/// Image provider family a model is served by
///
/// Fixed for the lifetime of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    /// Replicate: asynchronous job queue, completed by webhook or polling
    Replicate,
    /// `OpenAI` image generation: one synchronous call
    Openai,
    /// Stability text-to-image: one synchronous call
    Stability,
}

impl ProviderKind {
    /// Protocol family label used in logs
    pub const fn family(self) -> &'static str {
        match self {
            Self::Replicate => "async-job",
            Self::Openai => "sync-call-a",
            Self::Stability => "sync-call-b",
        }
    }
}

/// Named Replicate deployment a model can be routed through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub owner: String,
    pub name: String,
}

/// A selectable generator from the model catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: u32,
    /// Display name, also used to select models by name
    pub name: String,
    #[serde(default)]
    pub owner: String,
    pub source: ProviderKind,
    /// Provider-specific model version
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Submit through this deployment instead of the version endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,
    /// Template with a `{prompt}` placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    /// Extra input parameters sent with every prediction
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub default_params: Map<String, Value>,
    /// Selected by default; never persisted with predictions
    #[serde(default)]
    pub checked: bool,
}

impl ModelDescriptor {
    /// Apply the prompt template, if any, to the raw user prompt
    pub fn render_prompt(&self, raw: &str) -> String {
        match &self.prompt_template {
            Some(template) if template.contains("{prompt}") => template.replace("{prompt}", raw),
            _ => raw.to_owned(),
        }
    }
}
