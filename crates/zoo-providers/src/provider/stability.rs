use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;
use zoo_core::{GenerationRequest, Prediction, ProviderKind};

use super::{ProviderAdapter, RawResponse, finished_prediction};
use crate::error::{GenerationError, Result};

/// Default Stability API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.stability.ai";

/// Synchronous adapter for Stability text-to-image
pub struct StabilityAdapter {
    client: Client,
    api_key: SecretString,
    base_url: String,
    engine_id: String,
}

impl StabilityAdapter {
    pub fn new(client: Client, api_key: SecretString, base_url: Option<&Url>, engine_id: String) -> Self {
        Self {
            client,
            api_key,
            base_url: super::base_url(base_url, DEFAULT_BASE_URL),
            engine_id,
        }
    }
}

#[derive(Serialize)]
struct TextPrompt {
    text: String,
}

#[derive(Serialize)]
struct TextToImageRequest {
    text_prompts: Vec<TextPrompt>,
    cfg_scale: u32,
    clip_guidance_preset: &'static str,
    height: u32,
    width: u32,
    samples: u32,
    steps: u32,
}

#[derive(Deserialize)]
struct TextToImageResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    base64: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[async_trait]
impl ProviderAdapter for StabilityAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stability
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<RawResponse> {
        let url = format!("{}/v1/generation/{}/text-to-image", self.base_url, self.engine_id);

        let body = TextToImageRequest {
            text_prompts: vec![TextPrompt {
                text: request.rendered_prompt(),
            }],
            cfg_scale: 7,
            clip_guidance_preset: "FAST_BLUE",
            height: 512,
            width: 512,
            samples: 1,
            steps: 30,
        };

        tracing::debug!(engine = %self.engine_id, "sending Stability text-to-image request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .header(http::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Stability request failed");
                GenerationError::Connection(format!("Failed to send request to Stability: {e}"))
            })?;

        let raw = RawResponse::read(response, ProviderKind::Stability).await?;
        if !raw.is_success() {
            tracing::error!(status = raw.status, "Stability API error");
            return Err(raw.into_error());
        }

        Ok(raw)
    }

    fn normalize(&self, raw: RawResponse, request: &GenerationRequest) -> Result<Prediction> {
        let wire: TextToImageResponse = raw.decode(ProviderKind::Stability)?;

        let artifact = wire
            .artifacts
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::Protocol("Stability response contained no artifacts".to_owned()))?;

        if artifact.finish_reason.as_deref() == Some("ERROR") {
            return Err(GenerationError::Protocol("Stability reported a generation error".to_owned()));
        }

        let data = artifact
            .base64
            .filter(|b64| !b64.is_empty())
            .ok_or_else(|| GenerationError::Protocol("Stability artifact has no image data".to_owned()))?;

        STANDARD
            .decode(&data)
            .map_err(|e| GenerationError::Protocol(format!("Stability artifact is not valid base64: {e}")))?;

        finished_prediction(request, format!("data:image/png;base64,{data}"))
    }
}
