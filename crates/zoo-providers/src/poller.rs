//! Drives asynchronous predictions to a terminal state
//!
//! Every wait and every status query races the cancellation token, so an
//! abandoned submission stops polling promptly. The remote job itself is
//! not cancelled and keeps running on the provider side.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use zoo_core::Prediction;

use crate::error::{GenerationError, Result};
use crate::provider::JobStatusSource;

/// Fixed-interval job status poller
#[derive(Debug, Clone, Copy)]
pub struct PredictionPoller {
    interval: Duration,
}

impl Default for PredictionPoller {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl PredictionPoller {
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll until `prediction` is terminal
    ///
    /// `on_tick` sees the tracked prediction after every status query. Any
    /// failed query ends polling immediately; there is no retry.
    pub async fn run<F>(
        &self,
        source: &dyn JobStatusSource,
        mut prediction: Prediction,
        cancel: &CancellationToken,
        mut on_tick: F,
    ) -> Result<Prediction>
    where
        F: FnMut(&Prediction) + Send,
    {
        let mut ticks: u64 = 0;

        while !prediction.is_terminal() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GenerationError::Cancelled),
                () = tokio::time::sleep(self.interval) => {}
            }

            let snapshot = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GenerationError::Cancelled),
                snapshot = source.fetch(&prediction.id) => snapshot?,
            };

            ticks += 1;
            snapshot.apply_to(&mut prediction)?;
            tracing::trace!(id = %prediction.id, status = %prediction.status, ticks, "polled prediction");

            on_tick(&prediction);
        }

        tracing::debug!(id = %prediction.id, status = %prediction.status, ticks, "prediction settled");

        Ok(prediction)
    }
}
