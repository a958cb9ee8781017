use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use zoo_core::{GenerationRequest, ModelDescriptor, Prediction};
use zoo_providers::{GenerationError, PredictionPoller, ProviderRegistry};
use zoo_store::PredictionStore;
use zoo_telemetry::PredictionMetrics;

use crate::error::Result;
use crate::reconciler::{ResultReconciler, SlotKey, SubmissionView};

/// One prompt run against a set of models
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub prompt: String,
    pub models: Vec<ModelDescriptor>,
    pub outputs_per_model: u32,
    pub anon_id: Option<String>,
}

/// Report from a generation task to the reconciler
#[derive(Debug)]
enum SlotEvent {
    Progress(SlotKey, Prediction),
    Resolved(SlotKey, Prediction),
    Failed(SlotKey, String),
}

struct Shared {
    registry: ProviderRegistry,
    store: Arc<dyn PredictionStore>,
    poller: PredictionPoller,
    metrics: PredictionMetrics,
    shutdown: CancellationToken,
}

/// Dispatches generation tasks and tracks their results per submission
#[derive(Clone)]
pub struct SubmissionOrchestrator {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SubmissionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionOrchestrator")
            .field("registry", &self.shared.registry)
            .field("poller", &self.shared.poller)
            .finish_non_exhaustive()
    }
}

impl SubmissionOrchestrator {
    pub fn new(registry: ProviderRegistry, store: Arc<dyn PredictionStore>, poller: PredictionPoller) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                store,
                poller,
                metrics: PredictionMetrics::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.shared.registry
    }

    pub fn store(&self) -> &Arc<dyn PredictionStore> {
        &self.shared.store
    }

    /// Start a submission and return immediately
    ///
    /// One task is spawned per requested output of every model. Each task
    /// has its pending slot before it starts, so slot order follows the
    /// order of `models`. Must be called within a tokio runtime.
    pub fn submit(&self, request: SubmitRequest) -> SubmissionHandle {
        let submission_id = uuid::Uuid::new_v4().to_string();
        let mut reconciler = ResultReconciler::new(submission_id.clone());

        let mut jobs = Vec::new();
        for model in &request.models {
            for output_index in 0..request.outputs_per_model {
                let key = reconciler.push_pending(model);
                jobs.push((
                    key,
                    GenerationRequest {
                        prompt: request.prompt.clone(),
                        model: model.clone(),
                        submission_id: submission_id.clone(),
                        output_index,
                        anon_id: request.anon_id.clone(),
                    },
                ));
            }
        }

        tracing::info!(
            %submission_id,
            models = request.models.len(),
            outputs_per_model = request.outputs_per_model,
            tasks = jobs.len(),
            "submission started"
        );
        self.shared.metrics.record_submission(request.models.len());

        let (view_tx, view_rx) = watch::channel(reconciler.view().clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = self.shared.shutdown.child_token();

        tokio::spawn(reconcile(reconciler, events_rx, view_tx));

        for (key, generation) in jobs {
            let shared = Arc::clone(&self.shared);
            let events = events_tx.clone();
            let cancel = cancel.clone();
            let span = tracing::info_span!(
                "generation",
                submission_id = %generation.submission_id,
                model = %generation.model.name,
                family = generation.model.source.family(),
                output_index = generation.output_index,
            );

            tokio::spawn(
                async move { shared.run_slot(key, generation, &cancel, &events).await }.instrument(span),
            );
        }

        SubmissionHandle {
            submission_id,
            view: view_rx,
            cancel,
        }
    }

    /// View of a submission rebuilt from storage
    ///
    /// Every stored prediction becomes a resolved slot; nothing is pending.
    pub async fn open(&self, submission_id: &str) -> Result<SubmissionView> {
        let predictions = self.shared.store.list_by_submission(submission_id).await?;
        let mut reconciler = ResultReconciler::new(submission_id);

        for prediction in predictions {
            reconciler.insert_resolved(prediction);
        }

        Ok(reconciler.into_view())
    }

    /// Create a single prediction without polling it
    ///
    /// Synchronous providers return a finished record. Replicate returns
    /// the started job, which its webhook completes later.
    pub async fn create_prediction(&self, request: &GenerationRequest) -> Result<Prediction> {
        let adapter = self.shared.registry.get(request.model.source)?;
        let prediction = adapter.generate(request).await?;

        self.shared.persist(&prediction).await;

        Ok(prediction)
    }

    /// Current state of a stored prediction
    ///
    /// Unfinished Replicate predictions are looked up on the provider once
    /// and the stored record is brought up to date.
    pub async fn refresh(&self, id: &str) -> Result<Option<Prediction>> {
        let Some(mut prediction) = self.shared.store.get(id).await? else {
            return Ok(None);
        };

        if prediction.is_terminal() {
            return Ok(Some(prediction));
        }

        let adapter = self.shared.registry.get(prediction.source)?;
        let Some(source) = adapter.job_status() else {
            return Ok(Some(prediction));
        };

        let snapshot = source.fetch(id).await?;
        if snapshot.apply_to(&mut prediction)? {
            self.shared.store.upsert(&prediction).await?;
        }

        Ok(Some(prediction))
    }

    /// Cancel every running submission
    ///
    /// Remote jobs already created keep running on the provider side.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }
}

impl Shared {
    async fn run_slot(
        &self,
        key: SlotKey,
        request: GenerationRequest,
        cancel: &CancellationToken,
        events: &mpsc::UnboundedSender<SlotEvent>,
    ) {
        let start = Instant::now();
        let source = request.model.source.to_string();

        let outcome = self
            .generate(&request, cancel, |prediction| {
                emit(events, SlotEvent::Progress(key, prediction.clone()));
            })
            .await;

        match outcome {
            Ok(prediction) => {
                tracing::info!(
                    id = %prediction.id,
                    status = %prediction.status,
                    elapsed_ms = start.elapsed().as_millis(),
                    "generation finished"
                );
                self.metrics.record_prediction(
                    &source,
                    &request.model.name,
                    &prediction.status.to_string(),
                    start,
                );
                emit(events, SlotEvent::Resolved(key, prediction));
            }
            Err(e) => {
                if matches!(e, GenerationError::Cancelled) {
                    tracing::info!("generation cancelled");
                } else if e.is_provider_error() {
                    tracing::warn!(error = %e, error_type = e.error_type(), "provider failed generation");
                } else {
                    tracing::error!(error = %e, error_type = e.error_type(), "generation failed");
                }
                self.metrics
                    .record_prediction(&source, &request.model.name, e.error_type(), start);
                emit(events, SlotEvent::Failed(key, e.client_message()));
            }
        }
    }

    async fn generate<F>(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> std::result::Result<Prediction, GenerationError>
    where
        F: FnMut(&Prediction) + Send,
    {
        let adapter = self.registry.get(request.model.source)?;

        let prediction = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(GenerationError::Cancelled),
            result = adapter.generate(request) => result?,
        };

        if prediction.is_terminal() {
            self.persist(&prediction).await;
            return Ok(prediction);
        }

        let Some(source) = adapter.job_status() else {
            return Err(GenerationError::Protocol(format!(
                "{} returned an unfinished prediction but has no status endpoint",
                adapter.kind()
            )));
        };

        self.persist(&prediction).await;
        on_progress(&prediction);

        let provider = adapter.kind().to_string();
        let mut latest = prediction.clone();
        let polled = self
            .poller
            .run(source, prediction, cancel, |current| {
                self.metrics.record_poll(&provider);
                latest.clone_from(current);
                on_progress(current);
            })
            .await;

        match polled {
            Ok(done) => {
                self.persist(&done).await;
                Ok(done)
            }
            Err(GenerationError::Cancelled) => Err(GenerationError::Cancelled),
            Err(e) => {
                if latest.fail(e.client_message()).is_ok() {
                    self.persist(&latest).await;
                }
                Err(e)
            }
        }
    }

    async fn persist(&self, prediction: &Prediction) {
        if let Err(e) = self.store.upsert(prediction).await {
            tracing::error!(id = %prediction.id, error = %e, "failed to store prediction");
        }
    }
}

fn emit(events: &mpsc::UnboundedSender<SlotEvent>, event: SlotEvent) {
    if let Err(e) = events.send(event) {
        tracing::warn!(error = %e, "submission reconciler is gone, dropping slot event");
    }
}

/// Single writer of a submission's slots
///
/// Runs until every generation task has dropped its sender.
async fn reconcile(
    mut reconciler: ResultReconciler,
    mut events: mpsc::UnboundedReceiver<SlotEvent>,
    view: watch::Sender<SubmissionView>,
) {
    while let Some(event) = events.recv().await {
        let changed = match event {
            SlotEvent::Progress(key, prediction) => reconciler.observe(key, prediction),
            SlotEvent::Resolved(key, prediction) => reconciler.resolve(key, prediction),
            SlotEvent::Failed(key, message) => reconciler.fail(key, message),
        };

        if changed {
            view.send_replace(reconciler.view().clone());
        }
    }

    tracing::debug!(
        submission_id = %reconciler.view().submission_id,
        settled = reconciler.view().is_settled(),
        "submission reconciler finished"
    );
}

/// Caller's side of a running submission
///
/// Dropping the handle does not stop the submission; call
/// [`SubmissionHandle::cancel`] for that.
#[derive(Debug)]
pub struct SubmissionHandle {
    submission_id: String,
    view: watch::Receiver<SubmissionView>,
    cancel: CancellationToken,
}

impl SubmissionHandle {
    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    /// Latest snapshot
    pub fn view(&self) -> SubmissionView {
        self.view.borrow().clone()
    }

    /// Independent receiver of snapshots
    pub fn subscribe(&self) -> watch::Receiver<SubmissionView> {
        self.view.clone()
    }

    /// Wait for the next snapshot
    ///
    /// Returns `None` once the submission can no longer change.
    pub async fn changed(&mut self) -> Option<SubmissionView> {
        self.view.changed().await.ok()?;
        Some(self.view.borrow_and_update().clone())
    }

    /// Wait until every slot is settled
    pub async fn settled(&mut self) -> SubmissionView {
        if let Ok(view) = self.view.wait_for(SubmissionView::is_settled).await {
            return view.clone();
        }
        self.view.borrow().clone()
    }

    /// Abandon outstanding work
    ///
    /// Pending slots fail with a cancellation message. Jobs already created
    /// on a provider are not cancelled there.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
