//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::Map;
use url::Url;
use zoo_config::{
    Config, OpenAiConfig, PollerConfig, ProvidersConfig, ReplicateConfig, ServerConfig, StabilityConfig,
};
use zoo_core::{Deployment, ModelDescriptor, ProviderKind};

/// Version the mock Replicate API rejects
pub const REJECTED_VERSION: &str = "rejected-version";

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Every provider pointed at the mock backend, with one model each
    pub fn new(mock_base_url: &str) -> Self {
        let base: Url = mock_base_url.parse().expect("valid URL");

        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    ..ServerConfig::default()
                },
                providers: ProvidersConfig {
                    replicate: ReplicateConfig {
                        api_token: Some(SecretString::from("r8_test")),
                        base_url: Some(base.clone()),
                        webhook_host: Some("http://zoo.test".parse().expect("valid URL")),
                        image_dimensions: "512x512".to_owned(),
                    },
                    openai: Some(OpenAiConfig {
                        api_key: Some(SecretString::from("sk-test")),
                        base_url: Some(base.clone()),
                        size: "512x512".to_owned(),
                    }),
                    stability: Some(StabilityConfig {
                        api_key: Some(SecretString::from("sk-stability")),
                        base_url: Some(base),
                        engine_id: "stable-diffusion-xl-beta-v2-2-2".to_owned(),
                    }),
                },
                poller: PollerConfig {
                    interval: Duration::from_millis(20),
                },
                models: Vec::new(),
                telemetry: None,
            },
        }
        .with_model(model(1, "SDXL", ProviderKind::Replicate, "sdxl-v1", true))
        .with_model(model(2, "DALL-E", ProviderKind::Openai, "dall-e", true))
        .with_model(model(3, "Stable Diffusion", ProviderKind::Stability, "stability", false))
    }

    pub fn with_model(mut self, model: ModelDescriptor) -> Self {
        self.config.models.push(model);
        self
    }

    /// Replicate model whose version the mock rejects
    pub fn with_rejected_model(self, name: &str) -> Self {
        self.with_model(model(10, name, ProviderKind::Replicate, REJECTED_VERSION, false))
    }

    /// Replicate model routed through a named deployment
    pub fn with_deployment_model(self, name: &str, owner: &str, deployment: &str) -> Self {
        let mut descriptor = model(11, name, ProviderKind::Replicate, "", false);
        descriptor.deployment = Some(Deployment {
            owner: owner.to_owned(),
            name: deployment.to_owned(),
        });
        self.with_model(descriptor)
    }

    pub fn with_health_path(mut self, path: &str) -> Self {
        self.config.server.health_path = path.to_owned();
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config.validate().expect("test configuration is valid");
        self.config
    }
}

pub fn model(id: u32, name: &str, source: ProviderKind, version: &str, checked: bool) -> ModelDescriptor {
    ModelDescriptor {
        id,
        name: name.to_owned(),
        owner: String::new(),
        source,
        version: version.to_owned(),
        description: None,
        deployment: None,
        prompt_template: None,
        default_params: Map::new(),
        checked,
    }
}
