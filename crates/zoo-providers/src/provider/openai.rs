use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;
use zoo_core::{GenerationRequest, Prediction, ProviderKind};

use super::{ProviderAdapter, RawResponse, finished_prediction};
use crate::error::{GenerationError, Result};

/// Default `OpenAI` API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Synchronous adapter for `OpenAI` image generation
pub struct OpenAiAdapter {
    client: Client,
    api_key: SecretString,
    base_url: String,
    size: String,
}

impl OpenAiAdapter {
    pub fn new(client: Client, api_key: SecretString, base_url: Option<&Url>, size: String) -> Self {
        Self {
            client,
            api_key,
            base_url: super::base_url(base_url, DEFAULT_BASE_URL),
            size,
        }
    }
}

#[derive(Serialize)]
struct OpenAiImageRequest<'a> {
    prompt: String,
    n: u32,
    size: &'a str,
}

#[derive(Deserialize)]
struct OpenAiImageResponse {
    #[serde(default)]
    data: Vec<OpenAiImageData>,
}

#[derive(Deserialize)]
struct OpenAiImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Openai
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<RawResponse> {
        let url = format!("{}/v1/images/generations", self.base_url);

        let body = OpenAiImageRequest {
            prompt: request.rendered_prompt(),
            n: 1,
            size: &self.size,
        };

        tracing::debug!(model = %request.model.name, size = %self.size, "sending OpenAI image request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "OpenAI image request failed");
                GenerationError::Connection(format!("Failed to send request to OpenAI: {e}"))
            })?;

        let raw = RawResponse::read(response, ProviderKind::Openai).await?;
        if !raw.is_success() {
            tracing::error!(status = raw.status, "OpenAI image generation API error");
            return Err(raw.into_error());
        }

        Ok(raw)
    }

    fn normalize(&self, raw: RawResponse, request: &GenerationRequest) -> Result<Prediction> {
        let wire: OpenAiImageResponse = raw.decode(ProviderKind::Openai)?;

        let artifact = wire
            .data
            .into_iter()
            .next()
            .and_then(|image| {
                image
                    .url
                    .or_else(|| image.b64_json.map(|b64| format!("data:image/png;base64,{b64}")))
            })
            .ok_or_else(|| GenerationError::Protocol("OpenAI response contained no image".to_owned()))?;

        finished_prediction(request, artifact)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zoo_core::{ModelDescriptor, PredictionStatus};

    use super::*;

    fn adapter(base: &str) -> OpenAiAdapter {
        OpenAiAdapter::new(
            Client::new(),
            SecretString::from("sk-test"),
            Some(&Url::parse(base).unwrap()),
            "512x512".to_owned(),
        )
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "a red fox".to_owned(),
            model: ModelDescriptor {
                id: 2,
                name: "DALL-E".to_owned(),
                owner: "openai".to_owned(),
                source: ProviderKind::Openai,
                version: "dall-e".to_owned(),
                description: None,
                deployment: None,
                prompt_template: None,
                default_params: Map::new(),
                checked: true,
            },
            submission_id: "sub-1".to_owned(),
            output_index: 0,
            anon_id: None,
        }
    }

    #[tokio::test]
    async fn one_round_trip_yields_succeeded_prediction() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(json!({"prompt": "a red fox", "n": 1, "size": "512x512"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "created": 1_700_000_000,
                "data": [{"url": "https://oaidalle.example/fox.png"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let prediction = adapter(&server.uri()).generate(&request()).await.unwrap();

        assert_eq!(prediction.status, PredictionStatus::Succeeded);
        assert_eq!(prediction.output, vec!["https://oaidalle.example/fox.png".to_owned()]);
        assert_eq!(prediction.input.prompt, "a red fox");
        assert_eq!(prediction.version, "dall-e");
        assert!(uuid::Uuid::parse_str(&prediction.id).is_ok());
    }

    #[tokio::test]
    async fn missing_image_is_protocol_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"created": 1, "data": []})))
            .mount(&server)
            .await;

        let err = adapter(&server.uri()).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Protocol(_)));
        assert!(err.is_provider_error());
    }

    #[tokio::test]
    async fn api_error_surfaces_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Your request was rejected by the safety system"}
            })))
            .mount(&server)
            .await;

        let err = adapter(&server.uri()).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Provider { status: 400, .. }));
        assert_eq!(err.client_message(), "Your request was rejected by the safety system");
    }
}
