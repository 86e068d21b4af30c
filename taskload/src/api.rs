//! The HTTP contract of the task service, as seen by the driver.
use serde::Serialize;
use serde_json::Value;
use taskload_core::LOG_BODY_LIMIT;

/// Status and body of one call. A status of `0` means no response arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub nickname: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskPayload {
    pub summary: String,
    pub date: String,
}

/// Operations the scenario performs against the system under test.
///
/// Implementations are responsible for recording a [`MetricSample`](taskload_core::MetricSample)
/// per call; see [`HttpTaskApi`](crate::HttpTaskApi).
#[trait_variant::make(TaskApi: Send)]
pub trait LocalTaskApi {
    async fn register(&self, user: &NewUser) -> ApiResponse;
    async fn login(&self, login: &Login) -> ApiResponse;
    async fn create_task(&self, token: &str, task: &TaskPayload) -> ApiResponse;
    async fn update_task(&self, token: &str, id: &str, task: &TaskPayload) -> ApiResponse;
    async fn get_task(&self, token: &str, id: &str) -> ApiResponse;
    async fn delete_task(&self, token: &str, id: &str) -> ApiResponse;
}

/// Prefix of a response body small enough for a log line.
pub(crate) fn log_body(body: &str) -> &str {
    match body.char_indices().nth(LOG_BODY_LIMIT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
