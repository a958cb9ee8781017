use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;
use thiserror::Error;

use crate::{GenerationRequest, ProviderKind};

/// Lifecycle state of a prediction
///
/// Moves forward only: `starting → processing → {succeeded, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
}

impl PredictionStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Processing => 1,
            Self::Succeeded | Self::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` is allowed
    ///
    /// Staying in the same state is not a transition and is always allowed.
    pub const fn can_advance_to(self, next: Self) -> bool {
        if self as u8 == next as u8 {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// Rejected state change on a prediction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("prediction is already {from} and cannot become {to}")]
    FromTerminal { from: PredictionStatus, to: PredictionStatus },

    #[error("prediction reported success without output")]
    EmptyOutput,
}

/// Normalized generation input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub prompt: String,
    /// Untemplated prompt, kept only when a template changed it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_raw: Option<String>,
    /// Provider parameters other than the prompt
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One generation attempt and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub submission_id: String,
    pub model: String,
    pub source: ProviderKind,
    pub version: String,
    pub status: PredictionStatus,
    pub input: PredictionInput,
    /// Image URLs or `data:` URIs, non-empty exactly when succeeded
    #[serde(default)]
    pub output: Vec<String>,
    /// Provider failure detail, only when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub inserted_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_id: Option<String>,
}

impl Prediction {
    /// Start a prediction for `request` under the given id
    pub fn new(id: impl Into<String>, request: &GenerationRequest, status: PredictionStatus) -> Self {
        let now = Timestamp::now();

        Self {
            id: id.into(),
            submission_id: request.submission_id.clone(),
            model: request.model.name.clone(),
            source: request.model.source,
            version: request.model.version.clone(),
            status: if status.is_terminal() {
                PredictionStatus::Starting
            } else {
                status
            },
            input: request.input(),
            output: Vec::new(),
            error: None,
            created_at: now,
            inserted_at: now,
            anon_id: request.anon_id.clone(),
        }
    }

    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status observation reported by a provider
    ///
    /// Observations older than the current state are ignored. Returns
    /// whether anything changed.
    pub fn observe(
        &mut self,
        status: PredictionStatus,
        output: Vec<String>,
        error: Option<String>,
    ) -> Result<bool, TransitionError> {
        if self.status.is_terminal() {
            if status == self.status {
                return Ok(false);
            }
            return Err(TransitionError::FromTerminal {
                from: self.status,
                to: status,
            });
        }

        if !self.status.can_advance_to(status) {
            return Ok(false);
        }

        if status == PredictionStatus::Succeeded && output.is_empty() {
            return Err(TransitionError::EmptyOutput);
        }

        let changed = status != self.status;
        self.status = status;
        self.output = if status == PredictionStatus::Succeeded {
            output
        } else {
            Vec::new()
        };
        self.error = if status == PredictionStatus::Failed { error } else { None };

        Ok(changed)
    }

    /// Finish successfully with the given artifacts
    pub fn succeed(&mut self, output: Vec<String>) -> Result<(), TransitionError> {
        self.observe(PredictionStatus::Succeeded, output, None).map(|_| ())
    }

    /// Finish as failed with the provider's detail message
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.observe(PredictionStatus::Failed, Vec::new(), Some(error.into()))
            .map(|_| ())
    }
}

/// Prompt of a stored submission, taken from its first prediction
pub fn prompt_of(predictions: &[Prediction]) -> &str {
    predictions.first().map_or("", |p| {
        p.input.prompt_raw.as_deref().unwrap_or(&p.input.prompt)
    })
}

/// Distinct model names of a stored submission, in order of appearance
pub fn models_of(predictions: &[Prediction]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for prediction in predictions {
        if !names.contains(&prediction.model.as_str()) {
            names.push(&prediction.model);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelDescriptor;

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_owned(),
            model: ModelDescriptor {
                id: 1,
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
            anon_id: Some("anon".to_owned()),
        }
    }

    #[test]
    fn status_only_moves_forward() {
        use PredictionStatus::{Failed, Processing, Starting, Succeeded};

        assert!(Starting.can_advance_to(Processing));
        assert!(Starting.can_advance_to(Succeeded));
        assert!(Processing.can_advance_to(Failed));
        assert!(!Processing.can_advance_to(Starting));
        assert!(!Succeeded.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Processing));
        assert!(Succeeded.can_advance_to(Succeeded));
    }

    #[test]
    fn new_prediction_never_starts_terminal() {
        let prediction = Prediction::new("p1", &request("a red fox"), PredictionStatus::Succeeded);
        assert_eq!(prediction.status, PredictionStatus::Starting);
        assert!(prediction.output.is_empty());
        assert_eq!(prediction.input.prompt, "a red fox");
        assert_eq!(prediction.submission_id, "sub-1");
    }

    #[test]
    fn success_requires_output() {
        let mut prediction = Prediction::new("p1", &request("a red fox"), PredictionStatus::Starting);
        assert_eq!(prediction.succeed(Vec::new()), Err(TransitionError::EmptyOutput));
        assert_eq!(prediction.status, PredictionStatus::Starting);

        prediction.succeed(vec!["https://img/1.png".to_owned()]).unwrap();
        assert_eq!(prediction.status, PredictionStatus::Succeeded);
        assert_eq!(prediction.output.len(), 1);
    }

    #[test]
    fn terminal_prediction_is_frozen() {
        let mut prediction = Prediction::new("p1", &request("x"), PredictionStatus::Processing);
        prediction.fail("boom").unwrap();
        assert!(prediction.output.is_empty());
        assert_eq!(prediction.error.as_deref(), Some("boom"));

        let err = prediction
            .observe(PredictionStatus::Succeeded, vec!["u".to_owned()], None)
            .unwrap_err();
        assert!(matches!(err, TransitionError::FromTerminal { .. }));
        assert_eq!(prediction.status, PredictionStatus::Failed);

        assert_eq!(prediction.observe(PredictionStatus::Failed, Vec::new(), None), Ok(false));
    }

    #[test]
    fn stale_observation_is_ignored() {
        let mut prediction = Prediction::new("p1", &request("x"), PredictionStatus::Processing);
        let changed = prediction
            .observe(PredictionStatus::Starting, Vec::new(), None)
            .unwrap();
        assert!(!changed);
        assert_eq!(prediction.status, PredictionStatus::Processing);
    }

    #[test]
    fn output_is_dropped_unless_succeeded() {
        let mut prediction = Prediction::new("p1", &request("x"), PredictionStatus::Starting);
        prediction
            .observe(PredictionStatus::Processing, vec!["partial".to_owned()], None)
            .unwrap();
        assert!(prediction.output.is_empty());
    }

    #[test]
    fn serializes_with_snake_case_fields() {
        let prediction = Prediction::new("p1", &request("a red fox"), PredictionStatus::Starting);
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["submission_id"], "sub-1");
        assert_eq!(json["status"], "starting");
        assert_eq!(json["source"], "openai");
        assert_eq!(json["input"]["prompt"], "a red fox");
        assert!(json.get("error").is_none());

        let back: Prediction = serde_json::from_value(json).unwrap();
        assert_eq!(back, prediction);
    }

    #[test]
    fn submission_helpers_read_first_prompt_and_distinct_models() {
        let mut templated = request("a red fox");
        templated.model.prompt_template = Some("TOK {prompt}".to_owned());
        let a = Prediction::new("a", &templated, PredictionStatus::Starting);
        let b = Prediction::new("b", &templated, PredictionStatus::Starting);

        assert_eq!(prompt_of(&[a.clone(), b.clone()]), "a red fox");
        assert_eq!(models_of(&[a, b]), vec!["DALL-E"]);
        assert_eq!(prompt_of(&[]), "");
    }
}
