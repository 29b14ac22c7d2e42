//! Fake task manager
//!
//! Serves the task manager's HTTP API on a random port and records what it receives.
//! Responses are scriptable per test.

use super::constants::SERVER_READY_TIMEOUT_MS;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// A generation request as received on the wire.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Path segment the request was posted to (`viewerpdf`, `viewerepub`).
    pub endpoint: String,
    pub body: Value,
}

impl Submission {
    pub fn field(&self, name: &str) -> &str {
        self.body[name].as_str().unwrap_or_default()
    }
}

struct FakeState {
    submissions: Vec<Submission>,
    submit_response: (StatusCode, String),
    statuses: HashMap<String, String>,
    sizes: HashMap<String, String>,
    queue_positions: HashMap<String, String>,
}

type SharedState = Arc<Mutex<FakeState>>;

/// Fake task manager instance. Shuts down when dropped.
pub struct FakeTaskManager {
    /// Base URL to hand to the client (e.g., "http://127.0.0.1:12345/taskmanager")
    pub base_url: String,
    state: SharedState,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeTaskManager {
    /// Spawns a fake accepting every submission and reporting every job as WAITING.
    pub async fn spawn() -> Self {
        let state: SharedState = Arc::new(Mutex::new(FakeState {
            submissions: Vec::new(),
            submit_response: (StatusCode::OK, json!({"status": "OK"}).to_string()),
            statuses: HashMap::new(),
            sizes: HashMap::new(),
            queue_positions: HashMap::new(),
        }));

        let app = Router::new()
            .route("/taskmanager/{endpoint}", post(submit))
            .route("/taskmanager/{endpoint}/{identifier}/status", get(status))
            .route("/taskmanager/{endpoint}/{identifier}/size", get(size))
            .route("/taskmanager/{endpoint}/{identifier}/queue", get(queue))
            .with_state(state.clone());

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Fake task manager failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}/taskmanager", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready(port).await;
        server
    }

    async fn wait_for_ready(&self, port: u16) {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);
        while start.elapsed() < timeout {
            if tokio::net::TcpStream::connect(("127.0.0.1", port))
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Fake task manager did not become ready within {:?}", timeout);
    }

    /// Every submission received so far, oldest first.
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().unwrap().submissions.len()
    }

    /// Answer further submissions with `{status, errorMessage}` and the given HTTP status.
    pub fn reply_to_submissions(&self, code: StatusCode, status: &str, error_message: &str) {
        self.state.lock().unwrap().submit_response = (
            code,
            json!({"status": status, "errorMessage": error_message}).to_string(),
        );
    }

    /// Report `status` (and `error_message`, if any) for `identifier`.
    pub fn set_status(&self, identifier: &str, status: &str, error_message: Option<&str>) {
        let body = match error_message {
            Some(message) => json!({"status": status, "errorMessage": message}),
            None => json!({"status": status}),
        };
        self.set_raw_status(identifier, &body.to_string());
    }

    /// Answer the status poll of `identifier` with an arbitrary body.
    pub fn set_raw_status(&self, identifier: &str, body: &str) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(identifier.to_string(), body.to_string());
    }

    pub fn set_size(&self, identifier: &str, size: i64) {
        self.state
            .lock()
            .unwrap()
            .sizes
            .insert(identifier.to_string(), size.to_string());
    }

    pub fn set_queue_position(&self, identifier: &str, position: i64) {
        self.state
            .lock()
            .unwrap()
            .queue_positions
            .insert(identifier.to_string(), position.to_string());
    }
}

async fn submit(
    State(state): State<SharedState>,
    Path(endpoint): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut state = state.lock().unwrap();
    state.submissions.push(Submission { endpoint, body });
    state.submit_response.clone()
}

async fn status(
    State(state): State<SharedState>,
    Path((_endpoint, identifier)): Path<(String, String)>,
) -> impl IntoResponse {
    let state = state.lock().unwrap();
    state
        .statuses
        .get(&identifier)
        .cloned()
        .unwrap_or_else(|| json!({"status": "WAITING"}).to_string())
}

async fn size(
    State(state): State<SharedState>,
    Path((_endpoint, identifier)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.lock().unwrap().sizes.get(&identifier) {
        Some(size) => (StatusCode::OK, size.clone()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

async fn queue(
    State(state): State<SharedState>,
    Path((_endpoint, identifier)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.lock().unwrap().queue_positions.get(&identifier) {
        Some(position) => (StatusCode::OK, position.clone()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

/// URL on which nothing listens.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let port = listener
        .local_addr()
        .expect("Failed to get local address")
        .port();
    drop(listener);
    format!("http://127.0.0.1:{}/taskmanager", port)
}
