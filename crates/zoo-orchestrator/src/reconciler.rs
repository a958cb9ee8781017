//! Ordered view of a submission's slots
//!
//! Every generation task owns one slot at a fixed position. A slot starts
//! pending and later resolves to a prediction or fails with a message.
//! Positions never move, whatever order the tasks finish in.

use serde::Serialize;
use zoo_core::{ModelDescriptor, Prediction, PredictionStatus, ProviderKind};

/// Stable position of a slot within its submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SlotKey(usize);

impl SlotKey {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Progress of one slot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotState {
    /// Task in flight; `latest` is the last record seen from the provider
    Pending { latest: Option<Prediction> },
    Resolved(Prediction),
    /// Task rejected before producing a final record
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub key: SlotKey,
    pub model: String,
    pub source: ProviderKind,
    pub version: String,
    pub state: SlotState,
    /// Statuses observed for this slot, consecutive repeats collapsed
    pub statuses: Vec<PredictionStatus>,
}

impl Slot {
    /// Terminal record, or the latest in-flight one
    pub const fn prediction(&self) -> Option<&Prediction> {
        match &self.state {
            SlotState::Pending { latest } => latest.as_ref(),
            SlotState::Resolved(prediction) => Some(prediction),
            SlotState::Failed { .. } => None,
        }
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self.state, SlotState::Pending { .. })
    }

    /// Whether nothing more will happen to this slot
    pub const fn is_settled(&self) -> bool {
        match &self.state {
            SlotState::Pending { .. } => false,
            SlotState::Resolved(prediction) => prediction.is_terminal(),
            SlotState::Failed { .. } => true,
        }
    }

    fn record_status(&mut self, status: PredictionStatus) {
        if self.statuses.last() != Some(&status) {
            self.statuses.push(status);
        }
    }
}

/// Snapshot of a submission as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionView {
    pub submission_id: String,
    pub slots: Vec<Slot>,
    /// Messages of failed slots, in the order they failed
    pub errors: Vec<String>,
}

impl SubmissionView {
    /// Every slot has reached a terminal outcome
    ///
    /// There is no separate completion signal; this scan is it.
    pub fn is_settled(&self) -> bool {
        self.slots.iter().all(Slot::is_settled)
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Records currently known, in slot order
    pub fn predictions(&self) -> impl Iterator<Item = &Prediction> {
        self.slots.iter().filter_map(Slot::prediction)
    }

    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.is_pending()).count()
    }

    pub fn failed(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.state, SlotState::Failed { .. }))
            .count()
    }
}

/// Single owner of a submission's slot collection
#[derive(Debug, Clone)]
pub struct ResultReconciler {
    view: SubmissionView,
}

impl ResultReconciler {
    pub fn new(submission_id: impl Into<String>) -> Self {
        Self {
            view: SubmissionView {
                submission_id: submission_id.into(),
                slots: Vec::new(),
                errors: Vec::new(),
            },
        }
    }

    pub const fn view(&self) -> &SubmissionView {
        &self.view
    }

    pub fn into_view(self) -> SubmissionView {
        self.view
    }

    /// Append a pending slot for one output of `model`
    pub fn push_pending(&mut self, model: &ModelDescriptor) -> SlotKey {
        let key = SlotKey(self.view.slots.len());

        self.view.slots.push(Slot {
            key,
            model: model.name.clone(),
            source: model.source,
            version: model.version.clone(),
            state: SlotState::Pending { latest: None },
            statuses: Vec::new(),
        });

        key
    }

    /// Append a slot that is already resolved, as when reopening
    pub fn insert_resolved(&mut self, prediction: Prediction) -> SlotKey {
        let key = SlotKey(self.view.slots.len());

        self.view.slots.push(Slot {
            key,
            model: prediction.model.clone(),
            source: prediction.source,
            version: prediction.version.clone(),
            statuses: vec![prediction.status],
            state: SlotState::Resolved(prediction),
        });

        key
    }

    /// Record in-flight progress of a pending slot
    ///
    /// Returns false when the slot is unknown, no longer pending, or the
    /// record is older than what the slot already holds.
    pub fn observe(&mut self, key: SlotKey, prediction: Prediction) -> bool {
        let Some(slot) = self.view.slots.get_mut(key.0) else {
            return false;
        };

        let SlotState::Pending { latest } = &mut slot.state else {
            return false;
        };

        if latest
            .as_ref()
            .is_some_and(|current| !current.status.can_advance_to(prediction.status))
        {
            return false;
        }

        let status = prediction.status;
        *latest = Some(prediction);
        slot.record_status(status);

        true
    }

    /// Swap a pending slot for its final record, keeping its position
    pub fn resolve(&mut self, key: SlotKey, prediction: Prediction) -> bool {
        let Some(slot) = self.view.slots.get_mut(key.0) else {
            return false;
        };

        if !slot.is_pending() {
            tracing::debug!(slot = key.0, "ignoring resolution of a finished slot");
            return false;
        }

        slot.record_status(prediction.status);
        slot.state = SlotState::Resolved(prediction);

        true
    }

    /// Mark a pending slot failed and keep its message
    pub fn fail(&mut self, key: SlotKey, message: impl Into<String>) -> bool {
        let Some(slot) = self.view.slots.get_mut(key.0) else {
            return false;
        };

        if !slot.is_pending() {
            return false;
        }

        let message = message.into();
        slot.record_status(PredictionStatus::Failed);
        slot.state = SlotState::Failed {
            message: message.clone(),
        };
        self.view.errors.push(message);

        true
    }
}
