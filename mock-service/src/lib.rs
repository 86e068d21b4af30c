//! In-process stand-in for the maintenance task API.
//!
//! Implements just enough of the contract for the load driver: registration, login, and task
//! CRUD with the technician/manager role rules. Faults can be injected through [`MockConfig`],
//! and every handled call is logged so tests can assert on what the driver actually sent.
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{post, put},
    Json, Router,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, error, info, warn};

pub mod prelude {
    pub use crate::{run, spawn, CallRecord, MockConfig, MockService, Op, Role};
}

const SUMMARY_MIN_LEN: usize = 5;
const SUMMARY_MAX_LEN: usize = 2500;

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Answer every task creation with a 500.
    pub fail_create: bool,
    /// Store and echo only the first half of updated summaries.
    pub truncate_summary: bool,
    /// Added to every response.
    pub delay: Duration,
    pub manager_email: String,
    pub manager_password: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fail_create: false,
            truncate_summary: false,
            delay: Duration::ZERO,
            manager_email: "luther@gmail.com".to_string(),
            manager_password: "password".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Technician,
    Manager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Register,
    Login,
    Create,
    Update,
    Get,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub op: Op,
    pub token: Option<String>,
    pub task_id: Option<u64>,
    pub status: u16,
}

#[derive(Debug)]
struct User {
    id: u64,
    email: String,
    password: String,
    role: Role,
}

#[derive(Debug, Clone, Serialize)]
struct Task {
    id: u64,
    summary: String,
    author_id: u64,
    date: String,
}

#[derive(Debug, Default)]
struct Store {
    users: Vec<User>,
    tokens: HashMap<String, u64>,
    tasks: HashMap<u64, Task>,
    next_task_id: u64,
    issued_tokens: u64,
    calls: Vec<CallRecord>,
}

impl Store {
    fn user_for(&self, token: Option<&str>) -> Option<&User> {
        let id = self.tokens.get(token?)?;
        self.users.iter().find(|u| u.id == *id)
    }
}

#[derive(Debug, Deserialize)]
struct NewUser {
    nickname: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct Login {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct TaskBody {
    summary: String,
    #[serde(default)]
    date: Option<String>,
}

type Reply = (StatusCode, Option<Value>);

fn error(status: StatusCode, message: &str) -> Reply {
    (status, Some(json!({ "error": message })))
}

/// Handle to a running (or not yet served) mock. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct MockService {
    config: Arc<MockConfig>,
    store: Arc<Mutex<Store>>,
}

impl MockService {
    pub fn new(config: MockConfig) -> Self {
        let store = Store {
            users: vec![User {
                id: 1,
                email: config.manager_email.clone(),
                password: config.manager_password.clone(),
                role: Role::Manager,
            }],
            ..Default::default()
        };

        Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/users", post(register))
            .route("/login", post(login))
            .route("/tasks", post(create_task))
            .route("/tasks/:id", put(update_task).get(get_task).delete(delete_task))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    /// Role of the account a token was issued to.
    pub fn role_of(&self, token: &str) -> Option<Role> {
        self.lock().user_for(Some(token)).map(|u| u.role)
    }

    /// Tasks still stored, i.e. created and never deleted.
    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    async fn pause(&self) {
        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }
    }

    fn respond(
        &self,
        op: Op,
        token: Option<String>,
        task_id: Option<u64>,
        handler: impl FnOnce(&mut Store, Option<&str>) -> Reply,
    ) -> Response {
        let (status, body) = {
            let mut store = self.lock();
            let reply = handler(&mut *store, token.as_deref());
            store.calls.push(CallRecord {
                op,
                token,
                task_id,
                status: reply.0.as_u16(),
            });
            reply
        };

        counter!("mock-service.requests", "status" => status.as_u16().to_string()).increment(1);
        debug!("{op:?} -> {status}");
        match body {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn validate_summary(summary: &str) -> Result<(), Reply> {
    if summary.len() <= SUMMARY_MIN_LEN {
        Err(error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "summary min length is 5 characters",
        ))
    } else if summary.len() > SUMMARY_MAX_LEN {
        Err(error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "summary max length is 2500 characters",
        ))
    } else {
        Ok(())
    }
}

async fn register(State(svc): State<MockService>, Json(user): Json<NewUser>) -> Response {
    svc.pause().await;
    svc.respond(Op::Register, None, None, |store, _| {
        if user.nickname.is_empty() || user.email.is_empty() || user.password.is_empty() {
            return error(StatusCode::UNPROCESSABLE_ENTITY, "missing user details");
        }
        if store.users.iter().any(|u| u.email == user.email) {
            return error(StatusCode::UNPROCESSABLE_ENTITY, "email already taken");
        }

        let id = store.users.len() as u64 + 1;
        store.users.push(User {
            id,
            email: user.email.clone(),
            password: user.password,
            role: Role::Technician,
        });
        (
            StatusCode::CREATED,
            Some(json!({ "id": id, "nickname": user.nickname, "email": user.email })),
        )
    })
}

async fn login(State(svc): State<MockService>, Json(login): Json<Login>) -> Response {
    svc.pause().await;
    svc.respond(Op::Login, None, None, |store, _| {
        let Some(id) = store
            .users
            .iter()
            .find(|u| u.email == login.email && u.password == login.password)
            .map(|u| u.id)
        else {
            return error(StatusCode::UNPROCESSABLE_ENTITY, "incorrect details");
        };

        store.issued_tokens += 1;
        let token = format!("token-{id}-{}", store.issued_tokens);
        store.tokens.insert(token.clone(), id);
        (StatusCode::OK, Some(Value::String(token)))
    })
}

async fn create_task(
    State(svc): State<MockService>,
    headers: HeaderMap,
    Json(body): Json<TaskBody>,
) -> Response {
    svc.pause().await;
    let fail = svc.config.fail_create;
    svc.respond(Op::Create, bearer(&headers), None, |store, token| {
        let Some(user) = store.user_for(token) else {
            return error(StatusCode::UNAUTHORIZED, "unauthorized");
        };
        if user.role != Role::Technician {
            return error(StatusCode::UNAUTHORIZED, "unauthorized");
        }
        let author_id = user.id;
        if let Err(reply) = validate_summary(&body.summary) {
            return reply;
        }
        if fail {
            return error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure");
        }

        store.next_task_id += 1;
        let task = Task {
            id: store.next_task_id,
            summary: body.summary,
            author_id,
            date: body.date.unwrap_or_default(),
        };
        store.tasks.insert(task.id, task.clone());
        (StatusCode::CREATED, Some(json!(task)))
    })
}

async fn update_task(
    State(svc): State<MockService>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<TaskBody>,
) -> Response {
    svc.pause().await;
    let truncate = svc.config.truncate_summary;
    svc.respond(Op::Update, bearer(&headers), Some(id), |store, token| {
        let Some(user) = store.user_for(token) else {
            return error(StatusCode::UNAUTHORIZED, "unauthorized");
        };
        let (user_id, role) = (user.id, user.role);
        if let Err(reply) = validate_summary(&body.summary) {
            return reply;
        }
        let Some(task) = store.tasks.get_mut(&id) else {
            return error(StatusCode::NOT_FOUND, "task not found");
        };
        if role != Role::Technician || task.author_id != user_id {
            return error(StatusCode::UNAUTHORIZED, "unauthorized");
        }

        let mut summary = body.summary;
        if truncate {
            summary.truncate(summary.len() / 2);
        }
        task.summary = summary;
        if let Some(date) = body.date {
            task.date = date;
        }
        (StatusCode::OK, Some(json!(task)))
    })
}

async fn get_task(
    State(svc): State<MockService>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    svc.pause().await;
    svc.respond(Op::Get, bearer(&headers), Some(id), |store, token| {
        let Some(user) = store.user_for(token) else {
            return error(StatusCode::UNAUTHORIZED, "unauthorized");
        };
        let (user_id, role) = (user.id, user.role);
        let Some(task) = store.tasks.get(&id) else {
            return error(StatusCode::NOT_FOUND, "task not found");
        };
        if task.author_id != user_id && role != Role::Manager {
            return error(StatusCode::UNAUTHORIZED, "unauthorized");
        }
        (StatusCode::OK, Some(json!(task)))
    })
}

async fn delete_task(
    State(svc): State<MockService>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    svc.pause().await;
    svc.respond(Op::Delete, bearer(&headers), Some(id), |store, token| {
        match store.user_for(token).map(|u| u.role) {
            Some(Role::Manager) => {}
            _ => return error(StatusCode::UNAUTHORIZED, "unauthorized"),
        }
        match store.tasks.remove(&id) {
            Some(_) => (StatusCode::NO_CONTENT, None),
            None => error(StatusCode::NOT_FOUND, "task not found"),
        }
    })
}

/// Serve a fresh mock on an ephemeral localhost port in the background.
pub async fn spawn(config: MockConfig) -> anyhow::Result<(SocketAddr, MockService)> {
    let service = MockService::new(config);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let app = service.router();
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            error!("Mock service stopped: {err}");
        }
    });

    info!("Mock service listening on {addr}");
    Ok((addr, service))
}

pub async fn run(addr: SocketAddr, config: MockConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Mock service listening on {addr}");
    axum::serve(listener, MockService::new(config).router()).await?;
    Ok(())
}
