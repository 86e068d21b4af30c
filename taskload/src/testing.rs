//! In-memory [`TaskApi`] for unit tests.
use crate::api::{ApiResponse, Login, NewUser, TaskApi, TaskPayload};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use taskload_core::DEFAULT_MANAGER_EMAIL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub op: &'static str,
    pub token: String,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    calls: Mutex<Vec<Call>>,
    tasks: Mutex<HashMap<String, String>>,
    next_id: AtomicU64,
    refuse_logins: bool,
    fail_create: bool,
    omit_task_id: bool,
    truncate_summary: bool,
    delay: Duration,
}

impl FakeApi {
    pub const TECH_TOKEN: &'static str = "tech-token";
    pub const MANAGER_TOKEN: &'static str = "manager-token";

    pub fn refuse_logins(mut self) -> Self {
        self.refuse_logins = true;
        self
    }

    pub fn fail_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Answer creations with a bare 201.
    pub fn omit_task_id(mut self) -> Self {
        self.omit_task_id = true;
        self
    }

    pub fn truncate_summary(mut self) -> Self {
        self.truncate_summary = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.op == op).count()
    }

    async fn enter(&self, op: &'static str, token: &str) {
        self.calls.lock().unwrap().push(Call {
            op,
            token: token.to_string(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl TaskApi for FakeApi {
    async fn register(&self, _user: &NewUser) -> ApiResponse {
        self.enter("register", "").await;
        ApiResponse::new(201, "{}")
    }

    async fn login(&self, login: &Login) -> ApiResponse {
        self.enter("login", "").await;
        if self.refuse_logins {
            return ApiResponse::new(422, r#"{"error":"incorrect details"}"#);
        }
        let token = if login.email == DEFAULT_MANAGER_EMAIL {
            Self::MANAGER_TOKEN
        } else {
            Self::TECH_TOKEN
        };
        ApiResponse::new(200, json!(token).to_string())
    }

    async fn create_task(&self, token: &str, task: &TaskPayload) -> ApiResponse {
        self.enter("create", token).await;
        if self.fail_create {
            return ApiResponse::new(500, "boom");
        }
        if self.omit_task_id {
            return ApiResponse::new(201, json!({ "summary": task.summary }).to_string());
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.tasks
            .lock()
            .unwrap()
            .insert(id.to_string(), task.summary.clone());
        ApiResponse::new(201, json!({ "id": id, "summary": task.summary }).to_string())
    }

    async fn update_task(&self, token: &str, id: &str, task: &TaskPayload) -> ApiResponse {
        self.enter("update", token).await;
        let mut summary = task.summary.clone();
        if self.truncate_summary {
            summary.truncate(summary.len() / 2);
        }
        match self.tasks.lock().unwrap().get_mut(id) {
            Some(stored) => {
                *stored = summary.clone();
                ApiResponse::new(200, json!({ "id": id, "summary": summary }).to_string())
            }
            None => ApiResponse::new(404, ""),
        }
    }

    async fn get_task(&self, token: &str, id: &str) -> ApiResponse {
        self.enter("get", token).await;
        match self.tasks.lock().unwrap().get(id) {
            Some(summary) => {
                ApiResponse::new(200, json!({ "id": id, "summary": summary }).to_string())
            }
            None => ApiResponse::new(404, ""),
        }
    }

    async fn delete_task(&self, token: &str, id: &str) -> ApiResponse {
        self.enter("delete", token).await;
        if token != Self::MANAGER_TOKEN {
            return ApiResponse::new(403, "");
        }
        match self.tasks.lock().unwrap().remove(id) {
            Some(_) => ApiResponse::new(204, ""),
            None => ApiResponse::new(404, ""),
        }
    }
}
