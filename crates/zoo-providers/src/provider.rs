pub mod openai;
pub mod replicate;
pub mod stability;

use async_trait::async_trait;
use serde_json::Value;
use zoo_core::{GenerationRequest, Prediction, PredictionStatus, ProviderKind};

use crate::error::{GenerationError, Result};

/// Undecoded provider reply
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// JSON body, or the body text as a JSON string when it was not JSON
    pub body: Value,
}

impl RawResponse {
    /// Read status and body of a provider response
    pub(crate) async fn read(response: reqwest::Response, provider: ProviderKind) -> Result<Self> {
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            tracing::error!(%provider, error = %e, "failed to read provider response body");
            GenerationError::Connection(format!("failed to read {provider} response: {e}"))
        })?;

        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(Self { status, body })
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Provider error carrying the most specific detail the body offers
    pub fn into_error(self) -> GenerationError {
        let detail = self
            .body
            .get("detail")
            .and_then(Value::as_str)
            .or_else(|| self.body.pointer("/error/message").and_then(Value::as_str))
            .or_else(|| self.body.get("message").and_then(Value::as_str))
            .map(str::to_owned)
            .unwrap_or_else(|| match &self.body {
                Value::String(text) if !text.is_empty() => text.clone(),
                Value::Null => "Unknown error".to_owned(),
                other => other.to_string(),
            });

        GenerationError::Provider {
            status: self.status,
            detail,
        }
    }

    /// Decode the body into a provider wire type
    pub(crate) fn decode<T: serde::de::DeserializeOwned>(self, provider: ProviderKind) -> Result<T> {
        serde_json::from_value(self.body).map_err(|e| {
            tracing::error!(%provider, error = %e, "unexpected provider response shape");
            GenerationError::Protocol(format!("unexpected {provider} response: {e}"))
        })
    }
}

/// Status of a remote job at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: PredictionStatus,
    pub output: Vec<String>,
    pub error: Option<String>,
}

impl JobSnapshot {
    /// Fold this snapshot into a tracked prediction
    pub fn apply_to(self, prediction: &mut Prediction) -> Result<bool> {
        prediction
            .observe(self.status, self.output, self.error)
            .map_err(|e| GenerationError::Protocol(format!("prediction {}: {e}", prediction.id)))
    }
}

/// Translates a generation request into one provider's protocol
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider family served by this adapter
    fn kind(&self) -> ProviderKind;

    /// Issue the provider call
    async fn submit(&self, request: &GenerationRequest) -> Result<RawResponse>;

    /// Turn the provider reply into a prediction record
    fn normalize(&self, raw: RawResponse, request: &GenerationRequest) -> Result<Prediction>;

    /// Submit and normalize in one step
    async fn generate(&self, request: &GenerationRequest) -> Result<Prediction> {
        let raw = self.submit(request).await?;
        self.normalize(raw, request)
    }

    /// Status lookups for providers whose results arrive later
    fn job_status(&self) -> Option<&dyn JobStatusSource> {
        None
    }
}

/// Queries the current state of an asynchronous job
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn fetch(&self, prediction_id: &str) -> Result<JobSnapshot>;
}

/// Output of a synchronous provider as a finished prediction
pub(crate) fn finished_prediction(request: &GenerationRequest, artifact: String) -> Result<Prediction> {
    let mut prediction = Prediction::new(uuid::Uuid::new_v4().to_string(), request, PredictionStatus::Starting);
    prediction
        .succeed(vec![artifact])
        .map_err(|e| GenerationError::Protocol(e.to_string()))?;
    Ok(prediction)
}

/// `base` without trailing slash, falling back to `default`
pub(crate) fn base_url(base: Option<&url::Url>, default: &str) -> String {
    base.map_or(default, url::Url::as_str).trim_end_matches('/').to_owned()
}
