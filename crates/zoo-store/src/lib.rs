//! Durable record of predictions
//!
//! The store is the boundary to whatever database keeps predictions. Only
//! an in-memory implementation ships here; it backs the server and tests.

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::RwLock;
use zoo_core::Prediction;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by prediction stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this id already belongs to another submission
    #[error("prediction {id} belongs to submission {existing}, not {incoming}")]
    SubmissionConflict {
        id: String,
        existing: String,
        incoming: String,
    },

    /// Storage backend failure
    #[error("store backend: {0}")]
    Backend(String),
}

/// Effect of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Same record was already stored
    Unchanged,
    /// Record is older than the stored one, or the stored one is final
    Stale,
}

/// Persistence boundary for predictions
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Insert or update by id
    ///
    /// Idempotent: storing the same record twice keeps one entry. Updates
    /// that would move a stored prediction backwards are ignored.
    async fn upsert(&self, prediction: &Prediction) -> Result<UpsertOutcome>;

    async fn get(&self, id: &str) -> Result<Option<Prediction>>;

    /// Every prediction of a submission, in insertion order
    async fn list_by_submission(&self, submission_id: &str) -> Result<Vec<Prediction>>;
}

/// Process-local store keeping records in insertion order
#[derive(Debug, Default)]
pub struct InMemoryPredictionStore {
    records: RwLock<IndexMap<String, Prediction>>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PredictionStore for InMemoryPredictionStore {
    async fn upsert(&self, prediction: &Prediction) -> Result<UpsertOutcome> {
        let mut records = self.records.write().await;

        let Some(existing) = records.get_mut(&prediction.id) else {
            records.insert(prediction.id.clone(), prediction.clone());
            tracing::debug!(id = %prediction.id, status = %prediction.status, "stored prediction");
            return Ok(UpsertOutcome::Inserted);
        };

        if existing.submission_id != prediction.submission_id {
            return Err(StoreError::SubmissionConflict {
                id: prediction.id.clone(),
                existing: existing.submission_id.clone(),
                incoming: prediction.submission_id.clone(),
            });
        }

        let mut updated = prediction.clone();
        updated.created_at = existing.created_at;
        updated.inserted_at = existing.inserted_at;

        if *existing == updated {
            return Ok(UpsertOutcome::Unchanged);
        }

        // A terminal record is final, even against a differing terminal copy
        if existing.is_terminal() || !existing.status.can_advance_to(prediction.status) {
            tracing::debug!(
                id = %prediction.id,
                stored = %existing.status,
                incoming = %prediction.status,
                "ignoring stale prediction update"
            );
            return Ok(UpsertOutcome::Stale);
        }

        *existing = updated;
        tracing::debug!(id = %prediction.id, status = %prediction.status, "updated prediction");

        Ok(UpsertOutcome::Updated)
    }

    async fn get(&self, id: &str) -> Result<Option<Prediction>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list_by_submission(&self, submission_id: &str) -> Result<Vec<Prediction>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|p| p.submission_id == submission_id)
            .cloned()
            .collect())
    }
}
