//! Replicate prediction API
//!
//! Predictions are created with a webhook pointing back at this service and
//! then tracked by polling `GET /v1/predictions/{id}` until terminal.

use async_trait::async_trait;
use jiff::Timestamp;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use zoo_core::{GenerationRequest, Prediction, PredictionInput, PredictionStatus, ProviderKind};

use super::{JobSnapshot, JobStatusSource, ProviderAdapter, RawResponse};
use crate::error::{GenerationError, Result};

/// Default Replicate API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";

/// Route on this service that receives Replicate callbacks
pub const WEBHOOK_PATH: &str = "/api/replicate-webhook";

/// Asynchronous job adapter for Replicate
pub struct ReplicateAdapter {
    client: Client,
    api_token: SecretString,
    base_url: String,
    webhook_host: Url,
    image_dimensions: String,
}

impl ReplicateAdapter {
    pub fn new(
        client: Client,
        api_token: SecretString,
        base_url: Option<&Url>,
        webhook_host: Url,
        image_dimensions: String,
    ) -> Self {
        Self {
            client,
            api_token,
            base_url: super::base_url(base_url, DEFAULT_BASE_URL),
            webhook_host,
            image_dimensions,
        }
    }

    /// Callback address carrying the prediction's provenance
    ///
    /// The webhook path is appended to any path already on the host, so a
    /// service mounted under a prefix still receives its callbacks.
    pub fn webhook_url(&self, request: &GenerationRequest) -> Result<Url> {
        let mut url = self.webhook_host.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| GenerationError::Configuration("webhook host cannot carry a path".to_owned()))?
            .pop_if_empty()
            .extend(WEBHOOK_PATH.trim_start_matches('/').split('/'));

        url.query_pairs_mut()
            .append_pair("submission_id", &request.submission_id)
            .append_pair("model", &request.model.name)
            .append_pair("anon_id", request.anon_id.as_deref().unwrap_or_default())
            .append_pair("source", &ProviderKind::Replicate.to_string());

        Ok(url)
    }

    fn create_body(&self, request: &GenerationRequest) -> Result<CreatePrediction> {
        let mut input = request.model.default_params.clone();
        input.insert("prompt".to_owned(), Value::String(request.rendered_prompt()));
        input
            .entry("image_dimensions")
            .or_insert_with(|| Value::String(self.image_dimensions.clone()));

        let version = request
            .model
            .deployment
            .is_none()
            .then(|| request.model.version.clone());

        Ok(CreatePrediction {
            input,
            version,
            webhook: self.webhook_url(request)?.to_string(),
            webhook_events_filter: ["start", "completed"],
        })
    }

    fn authorization(&self) -> String {
        format!("Token {}", self.api_token.expose_secret())
    }
}

/// Wire format for prediction creation
#[derive(Debug, Serialize)]
struct CreatePrediction {
    input: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    webhook: String,
    webhook_events_filter: [&'static str; 2],
}

/// Prediction object as returned by Replicate and posted to webhooks
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatePrediction {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl ReplicatePrediction {
    /// Current job state in normalized form
    pub fn snapshot(&self) -> Result<JobSnapshot> {
        let status = match self.status.as_str() {
            "starting" => PredictionStatus::Starting,
            "processing" => PredictionStatus::Processing,
            "succeeded" => PredictionStatus::Succeeded,
            "failed" | "canceled" | "aborted" => PredictionStatus::Failed,
            other => {
                return Err(GenerationError::Protocol(format!(
                    "unknown Replicate status '{other}' for prediction {}",
                    self.id
                )));
            }
        };

        let output = match &self.output {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_owned).collect(),
            Some(Value::String(url)) => vec![url.clone()],
            _ => Vec::new(),
        };

        let error = match (&self.error, status) {
            (Some(Value::String(message)), _) => Some(message.clone()),
            (Some(Value::Null) | None, PredictionStatus::Failed) => Some(format!("prediction {}", self.status)),
            (Some(Value::Null) | None, _) => None,
            (Some(other), _) => Some(other.to_string()),
        };

        Ok(JobSnapshot { status, output, error })
    }
}

/// Query parameters attached to the webhook URL
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackProvenance {
    pub submission_id: String,
    pub model: String,
    #[serde(default)]
    pub anon_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Build the prediction record for a webhook delivery
pub fn prediction_from_callback(payload: ReplicatePrediction, provenance: CallbackProvenance) -> Result<Prediction> {
    if let Some(source) = provenance.source.as_deref()
        && source != ProviderKind::Replicate.to_string()
    {
        return Err(GenerationError::Protocol(format!("webhook for unexpected source '{source}'")));
    }

    let snapshot = payload.snapshot()?;
    let mut input = payload.input;
    let prompt = match input.remove("prompt") {
        Some(Value::String(prompt)) => prompt,
        _ => String::new(),
    };
    let created_at = payload.created_at.unwrap_or_else(Timestamp::now);

    let mut prediction = Prediction {
        id: payload.id,
        submission_id: provenance.submission_id,
        model: provenance.model,
        source: ProviderKind::Replicate,
        version: payload.version.unwrap_or_default(),
        status: PredictionStatus::Starting,
        input: PredictionInput {
            prompt,
            prompt_raw: None,
            extra: input,
        },
        output: Vec::new(),
        error: None,
        created_at,
        inserted_at: Timestamp::now(),
        anon_id: provenance.anon_id.filter(|id| !id.is_empty()),
    };
    snapshot.apply_to(&mut prediction)?;

    Ok(prediction)
}

#[async_trait]
impl ProviderAdapter for ReplicateAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Replicate
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<RawResponse> {
        let body = self.create_body(request)?;

        let url = match &request.model.deployment {
            Some(deployment) => {
                tracing::info!(
                    owner = %deployment.owner,
                    deployment = %deployment.name,
                    "running prediction using deployment"
                );
                format!(
                    "{}/v1/deployments/{}/{}/predictions",
                    self.base_url, deployment.owner, deployment.name
                )
            }
            None => format!("{}/v1/predictions", self.base_url),
        };

        let response = self
            .client
            .post(&url)
            .header(http::header::AUTHORIZATION, self.authorization())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Replicate create request failed");
                GenerationError::Connection(format!("Failed to send request to Replicate: {e}"))
            })?;

        let raw = RawResponse::read(response, ProviderKind::Replicate).await?;

        if raw.status != 201 {
            // A rejected deployment submission is not retried on the version
            // endpoint; the job may already be queued remotely.
            tracing::error!(
                status = raw.status,
                model = %request.model.name,
                deployment = request.model.deployment.is_some(),
                "Replicate rejected prediction"
            );
            return Err(raw.into_error());
        }

        Ok(raw)
    }

    fn normalize(&self, raw: RawResponse, request: &GenerationRequest) -> Result<Prediction> {
        let wire: ReplicatePrediction = raw.decode(ProviderKind::Replicate)?;
        let snapshot = wire.snapshot()?;

        let mut prediction = Prediction::new(wire.id, request, PredictionStatus::Starting);
        if prediction.version.is_empty()
            && let Some(version) = wire.version
        {
            prediction.version = version;
        }
        if let Some(created_at) = wire.created_at {
            prediction.created_at = created_at;
        }
        for (key, value) in &request.model.default_params {
            prediction.input.extra.insert(key.clone(), value.clone());
        }

        snapshot.apply_to(&mut prediction)?;

        tracing::debug!(id = %prediction.id, status = %prediction.status, "Replicate prediction created");

        Ok(prediction)
    }

    fn job_status(&self) -> Option<&dyn JobStatusSource> {
        Some(self)
    }
}

#[async_trait]
impl JobStatusSource for ReplicateAdapter {
    async fn fetch(&self, prediction_id: &str) -> Result<JobSnapshot> {
        let url = format!("{}/v1/predictions/{prediction_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(http::header::AUTHORIZATION, self.authorization())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(id = %prediction_id, error = %e, "Replicate status request failed");
                GenerationError::Connection(format!("Failed to query Replicate prediction: {e}"))
            })?;

        let raw = RawResponse::read(response, ProviderKind::Replicate).await?;
        if raw.status != 200 {
            tracing::warn!(id = %prediction_id, status = raw.status, "Replicate status query failed");
            return Err(raw.into_error());
        }

        let wire: ReplicatePrediction = raw.decode(ProviderKind::Replicate)?;
        wire.snapshot()
    }
}
