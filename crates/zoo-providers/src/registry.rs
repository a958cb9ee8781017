use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use zoo_config::ProvidersConfig;
use zoo_core::ProviderKind;

use crate::{
    error::{GenerationError, Result},
    http_client::build_client,
    provider::{
        ProviderAdapter, openai::OpenAiAdapter, replicate::ReplicateAdapter, stability::StabilityAdapter,
    },
};

/// Round-trip timeout for a single provider call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Adapter instances keyed by provider, resolved once at startup
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Build every configured adapter
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the Replicate token or webhook
    /// host is missing, or a configured provider has no API key
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let client = build_client(REQUEST_TIMEOUT)?;
        let mut registry = Self::default();

        let replicate = &config.replicate;
        let token = require_secret("replicate", replicate.api_token.as_ref())?;
        let webhook_host = replicate.webhook_host.clone().ok_or_else(|| {
            GenerationError::Configuration(
                "webhook host is required; without it Replicate predictions are never recorded".to_owned(),
            )
        })?;
        registry = registry.with_adapter(Arc::new(ReplicateAdapter::new(
            client.clone(),
            token,
            replicate.base_url.as_ref(),
            webhook_host,
            replicate.image_dimensions.clone(),
        )));

        if let Some(openai) = &config.openai {
            let key = require_secret("openai", openai.api_key.as_ref())?;
            registry = registry.with_adapter(Arc::new(OpenAiAdapter::new(
                client.clone(),
                key,
                openai.base_url.as_ref(),
                openai.size.clone(),
            )));
        }

        if let Some(stability) = &config.stability {
            let key = require_secret("stability", stability.api_key.as_ref())?;
            registry = registry.with_adapter(Arc::new(StabilityAdapter::new(
                client,
                key,
                stability.base_url.as_ref(),
                stability.engine_id.clone(),
            )));
        }

        tracing::debug!(providers = registry.adapters.len(), "provider registry initialized");

        Ok(registry)
    }

    /// Register an adapter, replacing any adapter of the same kind
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    /// Adapter serving `kind`
    ///
    /// # Errors
    ///
    /// Returns an error when no adapter was configured for `kind`
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(&kind)
            .cloned()
            .ok_or(GenerationError::ProviderNotConfigured(kind))
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.adapters.contains_key(&kind)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn require_secret(name: &str, secret: Option<&SecretString>) -> Result<SecretString> {
    secret
        .filter(|s| !s.expose_secret().trim().is_empty())
        .cloned()
        .ok_or_else(|| GenerationError::Configuration(format!("API key required for image provider '{name}'")))
}
