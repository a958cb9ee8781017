use crate::{ModelDescriptor, PredictionInput};

/// One provider-agnostic generation job: a single output of a single model
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Prompt as typed by the user, before templating
    pub prompt: String,
    pub model: ModelDescriptor,
    pub submission_id: String,
    /// Position of this output among the model's requested outputs
    pub output_index: u32,
    pub anon_id: Option<String>,
}

impl GenerationRequest {
    /// Final prompt sent to the provider
    pub fn rendered_prompt(&self) -> String {
        self.model.render_prompt(&self.prompt)
    }

    /// Normalized input recorded on the prediction
    pub fn input(&self) -> PredictionInput {
        let prompt = self.rendered_prompt();
        let prompt_raw = (prompt != self.prompt).then(|| self.prompt.clone());

        PredictionInput {
            prompt,
            prompt_raw,
            extra: serde_json::Map::new(),
        }
    }
}
