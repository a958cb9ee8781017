use std::collections::HashSet;
use std::path::Path;

use secrecy::ExposeSecret;
use zoo_core::ProviderKind;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Expands `{{ env.VAR }}` placeholders, deserializes, then validates.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a placeholder cannot be
    /// resolved, the TOML is malformed, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus file access
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        tracing::debug!(models = config.models.len(), "configuration loaded");

        Ok(config)
    }

    /// Check the settings required before any prediction can run
    ///
    /// # Errors
    ///
    /// Returns an error when the Replicate token or webhook host is missing,
    /// or the model catalog references an unconfigured provider
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_replicate()?;
        self.validate_models()?;

        if self.poller.interval.is_zero() {
            anyhow::bail!("poller.interval must be greater than zero");
        }

        Ok(())
    }

    fn validate_replicate(&self) -> anyhow::Result<()> {
        let replicate = &self.providers.replicate;

        let has_token = replicate
            .api_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().trim().is_empty());
        if !has_token {
            anyhow::bail!("providers.replicate.api_token is not set; Replicate predictions cannot be created");
        }

        if replicate.webhook_host.is_none() {
            anyhow::bail!(
                "providers.replicate.webhook_host is not set; Replicate predictions would never be saved. \
                 Point it at a public address (e.g. an ngrok URL when running locally)"
            );
        }

        Ok(())
    }

    fn validate_models(&self) -> anyhow::Result<()> {
        let mut names = HashSet::new();

        for model in &self.models {
            if !names.insert(model.name.as_str()) {
                anyhow::bail!("duplicate model name '{}' in catalog", model.name);
            }

            let configured = match model.source {
                ProviderKind::Replicate => true,
                ProviderKind::Openai => self.providers.openai.is_some(),
                ProviderKind::Stability => self.providers.stability.is_some(),
            };
            if !configured {
                anyhow::bail!(
                    "model '{}' uses provider '{}' which is not configured",
                    model.name,
                    model.source
                );
            }

            if model.deployment.is_some() && model.source != ProviderKind::Replicate {
                anyhow::bail!("model '{}' names a deployment but is not a Replicate model", model.name);
            }

            if model.source == ProviderKind::Replicate && model.deployment.is_none() && model.version.trim().is_empty() {
                anyhow::bail!("Replicate model '{}' needs a version or a deployment", model.name);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use crate::Config;

    const BASE: &str = r#"
        [providers.replicate]
        api_token = "r8_test"
        webhook_host = "https://zoo.example.com"
    "#;

    #[test]
    fn minimal_config_is_valid() {
        let config = Config::from_toml(BASE).unwrap();
        assert!(config.models.is_empty());
        assert_eq!(config.poller.interval, Duration::from_millis(500));
        assert_eq!(config.server.health_path, "/health");
    }

    #[test]
    fn missing_token_fails_fast() {
        let err = Config::from_toml("[providers.replicate]\nwebhook_host = \"https://h\"").unwrap_err();
        assert!(err.to_string().contains("api_token"));
    }

    #[test]
    fn missing_webhook_host_fails_fast() {
        let err = Config::from_toml("[providers.replicate]\napi_token = \"r8\"").unwrap_err();
        assert!(err.to_string().contains("webhook_host"));
    }

    #[test]
    fn catalog_models_must_have_configured_provider() {
        let raw = format!(
            "{BASE}
            [[models]]
            id = 1
            name = \"DALL-E\"
            source = \"openai\"
            version = \"dall-e\"
            "
        );
        let err = Config::from_toml(&raw).unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn duplicate_model_names_are_rejected() {
        let raw = format!(
            "{BASE}
            [[models]]
            id = 1
            name = \"SDXL\"
            source = \"replicate\"
            version = \"abc\"

            [[models]]
            id = 2
            name = \"SDXL\"
            source = \"replicate\"
            version = \"def\"
            "
        );
        let err = Config::from_toml(&raw).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn catalog_with_deployment_and_defaults() {
        let raw = format!(
            "{BASE}
            [providers.openai]
            api_key = \"sk\"

            [[models]]
            id = 1
            name = \"SDXL\"
            owner = \"stability-ai\"
            source = \"replicate\"
            version = \"\"
            checked = true
            prompt_template = \"a photo of TOK, {{prompt}}\"
            deployment = {{ owner = \"replicate\", name = \"sdxl\" }}
            default_params = {{ width = 1024, height = 1024 }}

            [[models]]
            id = 2
            name = \"DALL-E\"
            source = \"openai\"
            version = \"dall-e\"
            "
        );
        let config = Config::from_toml(&raw).unwrap();
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.default_models().len(), 1);

        let sdxl = config.model("SDXL").unwrap();
        assert_eq!(sdxl.deployment.as_ref().unwrap().name, "sdxl");
        assert_eq!(sdxl.default_params["width"], 1024);
        assert!(config.model("Midjourney").is_none());
    }

    #[test]
    fn load_reads_file_and_expands_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[providers.replicate]\napi_token = \"{{{{ env.ZOO_LOADER_TOKEN }}}}\"\nwebhook_host = \"https://h.dev\""
        )
        .unwrap();

        temp_env::with_var("ZOO_LOADER_TOKEN", Some("r8_from_env"), || {
            let config = Config::load(file.path()).unwrap();
            assert!(config.providers.replicate.api_token.is_some());
        });
    }

    #[test]
    fn example_config_is_valid() {
        let vars = [
            ("REPLICATE_API_TOKEN", Some("r8_example")),
            ("WEBHOOK_HOST", Some("https://zoo.example.com")),
            ("OPENAI_API_KEY", Some("sk-example")),
            ("STABILITY_API_KEY", Some("sk-stability")),
            ("ZOO_LOG", None),
        ];

        temp_env::with_vars(vars, || {
            let config = Config::from_toml(include_str!("../../../zoo.toml")).unwrap();

            assert_eq!(config.models.len(), 5);
            assert_eq!(config.default_models().len(), 2);
            assert_eq!(config.telemetry.as_ref().unwrap().log_filter, "info");

            let pixel = config.model("SDXL Pixel Art").unwrap();
            assert_eq!(pixel.render_prompt("a castle"), "pixel art, a castle");
            assert!(config.model("Stable Diffusion (deployment)").unwrap().deployment.is_some());
        });
    }
}
