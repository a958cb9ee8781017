//! Mock image provider backend for integration tests
//!
//! Serves the Replicate, `OpenAI` and Stability endpoints Zoo calls, with
//! canned responses. Replicate jobs report `processing` for the first two
//! status queries and `succeeded` from the third on.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::config::REJECTED_VERSION;

pub const REJECTION_DETAIL: &str = "Invalid version or not permitted";

/// Status queries answered with `processing` before a job succeeds
pub const PROCESSING_POLLS: u32 = 2;

pub struct MockProviders {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    next_job: AtomicU32,
    polls: Mutex<HashMap<String, u32>>,
    /// Bodies of accepted Replicate create calls
    replicate_bodies: Mutex<Vec<Value>>,
    deployment_count: AtomicU32,
    openai_count: AtomicU32,
    stability_count: AtomicU32,
}

impl MockProviders {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::default());

        let app = Router::new()
            .route("/v1/predictions", routing::post(create_replicate))
            .route("/v1/predictions/{id}", routing::get(get_replicate))
            .route(
                "/v1/deployments/{owner}/{name}/predictions",
                routing::post(create_deployment),
            )
            .route("/v1/images/generations", routing::post(openai_generate))
            .route("/v1/generation/{engine}/text-to-image", routing::post(stability_generate))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Bodies of every accepted Replicate create call
    pub fn replicate_bodies(&self) -> Vec<Value> {
        self.state.replicate_bodies.lock().unwrap().clone()
    }

    pub fn polls(&self, id: &str) -> u32 {
        self.state.polls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn deployment_count(&self) -> u32 {
        self.state.deployment_count.load(Ordering::Relaxed)
    }

    pub fn openai_count(&self) -> u32 {
        self.state.openai_count.load(Ordering::Relaxed)
    }

    pub fn stability_count(&self) -> u32 {
        self.state.stability_count.load(Ordering::Relaxed)
    }
}

impl Drop for MockProviders {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn job(id: &str, status: &str, input: &Value, output: &Value) -> Value {
    json!({
        "id": id,
        "status": status,
        "version": "sdxl-v1",
        "input": input,
        "output": output,
        "error": null,
        "created_at": "2024-05-01T10:00:00.000Z"
    })
}

fn start_job(state: &MockState, body: Value) -> (StatusCode, Json<Value>) {
    let id = format!("rep-{}", state.next_job.fetch_add(1, Ordering::Relaxed) + 1);
    let input = body["input"].clone();
    state.replicate_bodies.lock().unwrap().push(body);

    (StatusCode::CREATED, Json(job(&id, "starting", &input, &Value::Null)))
}

async fn create_replicate(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> impl IntoResponse {
    if body["version"] == REJECTED_VERSION {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"title": "Invalid version", "detail": REJECTION_DETAIL, "status": 422})),
        );
    }

    start_job(&state, body)
}

async fn create_deployment(
    State(state): State<Arc<MockState>>,
    Path((_owner, name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.deployment_count.fetch_add(1, Ordering::Relaxed);

    if name == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."})));
    }

    start_job(&state, body)
}

async fn get_replicate(State(state): State<Arc<MockState>>, Path(id): Path<String>) -> impl IntoResponse {
    if !id.starts_with("rep-") {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."})));
    }

    let polls = {
        let mut polls = state.polls.lock().unwrap();
        let count = polls.entry(id.clone()).or_default();
        *count += 1;
        *count
    };

    let input = json!({"prompt": "a blue cat"});
    let body = if polls > PROCESSING_POLLS {
        job(&id, "succeeded", &input, &json!([format!("https://replicate.delivery/{id}.png")]))
    } else {
        job(&id, "processing", &input, &Value::Null)
    };

    (StatusCode::OK, Json(body))
}

async fn openai_generate(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> impl IntoResponse {
    state.openai_count.fetch_add(1, Ordering::Relaxed);

    if body["prompt"].as_str().is_some_and(|p| p.contains("forbidden")) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"message": "Your request was rejected by the safety system."}})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "created": 1_700_000_000,
            "data": [{"url": "https://images.openai.test/fox.png"}]
        })),
    )
}

async fn stability_generate(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    state.stability_count.fetch_add(1, Ordering::Relaxed);

    Json(json!({
        "artifacts": [{"base64": "aGVsbG8=", "seed": 42, "finishReason": "SUCCESS"}]
    }))
}
