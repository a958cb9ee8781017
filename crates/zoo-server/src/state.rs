use std::sync::Arc;

use zoo_core::ModelDescriptor;
use zoo_orchestrator::SubmissionOrchestrator;

use crate::error::{ApiError, Result};

/// Shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub orchestrator: SubmissionOrchestrator,
    pub models: Arc<[ModelDescriptor]>,
}

impl AppState {
    pub fn model(&self, name: &str) -> Result<&ModelDescriptor> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| ApiError::InvalidRequest(format!("unknown model '{name}'")))
    }
}
