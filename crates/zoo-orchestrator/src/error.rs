use thiserror::Error;
use zoo_providers::GenerationError;
use zoo_store::StoreError;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Failure of an orchestrator operation that touches both providers and storage
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
