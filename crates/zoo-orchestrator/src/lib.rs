//! Fan-out of image generation across models and providers
//!
//! A submission runs one task per (model, output) pair. Tasks report to a
//! single reconciler task that owns the ordered slot collection and
//! publishes snapshots to watchers.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod error;
mod orchestrator;
pub mod reconciler;

pub use error::{OrchestratorError, Result};
pub use orchestrator::{SubmissionHandle, SubmissionOrchestrator, SubmitRequest};
pub use reconciler::{ResultReconciler, Slot, SlotKey, SlotState, SubmissionView};
