//! Metric names and the prediction instruments

use std::time::Instant;

use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

pub const PREDICTION_COUNT: &str = "zoo.prediction.count";
pub const PREDICTION_DURATION: &str = "zoo.prediction.duration";
pub const SUBMISSION_COUNT: &str = "zoo.submission.count";
pub const POLL_COUNT: &str = "zoo.poll.count";

/// Instruments recorded for every finished prediction
#[derive(Debug, Clone)]
pub struct PredictionMetrics {
    predictions: Counter<u64>,
    duration: Histogram<f64>,
    submissions: Counter<u64>,
    polls: Counter<u64>,
}

impl Default for PredictionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionMetrics {
    /// Instruments bound to the global meter provider
    ///
    /// Without an installed provider the instruments are no-ops.
    #[must_use]
    pub fn new() -> Self {
        let meter = global::meter("zoo");

        Self {
            predictions: meter
                .u64_counter(PREDICTION_COUNT)
                .with_description("Finished predictions by provider and outcome")
                .build(),
            duration: meter
                .f64_histogram(PREDICTION_DURATION)
                .with_description("Time from submit to terminal state")
                .with_unit("s")
                .build(),
            submissions: meter
                .u64_counter(SUBMISSION_COUNT)
                .with_description("Submissions started")
                .build(),
            polls: meter
                .u64_counter(POLL_COUNT)
                .with_description("Job status polls issued")
                .build(),
        }
    }

    pub fn record_prediction(&self, source: &str, model: &str, outcome: &str, start: Instant) {
        let attributes = [
            KeyValue::new("zoo.provider", source.to_owned()),
            KeyValue::new("zoo.model", model.to_owned()),
            KeyValue::new("zoo.outcome", outcome.to_owned()),
        ];

        self.predictions.add(1, &attributes);
        self.duration.record(start.elapsed().as_secs_f64(), &attributes);
    }

    pub fn record_submission(&self, models: usize) {
        self.submissions
            .add(1, &[KeyValue::new("zoo.models", i64::try_from(models).unwrap_or(i64::MAX))]);
    }

    pub fn record_poll(&self, source: &str) {
        self.polls.add(1, &[KeyValue::new("zoo.provider", source.to_owned())]);
    }
}
