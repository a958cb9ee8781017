use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Credentials and endpoints for every image provider
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Replicate is always required: its completions are delivered by webhook
    #[serde(default)]
    pub replicate: ReplicateConfig,
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
    #[serde(default)]
    pub stability: Option<StabilityConfig>,
}

/// Replicate prediction API
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplicateConfig {
    #[serde(default)]
    pub api_token: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Public address of this service, used to build the webhook URL
    ///
    /// May carry a path prefix; the webhook path is appended to it.
    #[serde(default)]
    pub webhook_host: Option<Url>,
    /// Value of the `image_dimensions` input
    #[serde(default = "default_image_dimensions")]
    pub image_dimensions: String,
}

/// `OpenAI` image generation API
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub base_url: Option<Url>,
    #[serde(default = "default_image_size")]
    pub size: String,
}

/// Stability text-to-image API
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StabilityConfig {
    #[serde(default)]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub base_url: Option<Url>,
    #[serde(default = "default_engine_id")]
    pub engine_id: String,
}

fn default_image_dimensions() -> String {
    "512x512".to_string()
}

fn default_image_size() -> String {
    "512x512".to_string()
}

fn default_engine_id() -> String {
    "stable-diffusion-xl-beta-v2-2-2".to_string()
}
