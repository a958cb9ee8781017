//! Shared domain types for Zoo
//!
//! A `Prediction` is one generation attempt against one image provider.
//! Predictions created by a single prompt submission share a submission id.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod model;
mod prediction;
mod request;

pub use model::{Deployment, ModelDescriptor, ProviderKind};
pub use prediction::{
    Prediction, PredictionInput, PredictionStatus, TransitionError, models_of, prompt_of,
};
pub use request::GenerationRequest;
