#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod error;
mod http_client;
mod poller;
pub mod provider;
mod registry;

pub use error::{GenerationError, Result};
pub use http_client::{USER_AGENT, build_client};
pub use poller::PredictionPoller;
pub use provider::replicate::{CallbackProvenance, ReplicatePrediction, WEBHOOK_PATH, prediction_from_callback};
pub use provider::{JobSnapshot, JobStatusSource, ProviderAdapter, RawResponse};
pub use registry::ProviderRegistry;
