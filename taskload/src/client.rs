use crate::api::{ApiResponse, Login, NewUser, TaskApi, TaskPayload};
use crate::error::DriverError;
use crate::recorder::Recorder;
use crate::transaction::{rate_limiter, transaction};
use governor::DefaultDirectRateLimiter;
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use taskload_core::{RequestName, RunConfig};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// [`TaskApi`] over plain HTTP/JSON. Every call is timed and recorded.
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
    limiter: Option<DefaultDirectRateLimiter>,
    recorder: Arc<Recorder>,
}

impl HttpTaskApi {
    pub fn new(config: &RunConfig, recorder: Arc<Recorder>) -> Result<Self, DriverError> {
        let mut builder = Client::builder().pool_max_idle_per_host(config.max_target().max(1));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter: config.max_rps.map(rate_limiter),
            recorder,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn task_url(&self, id: &str) -> String {
        self.url(&format!("/tasks/{id}"))
    }

    async fn send(&self, name: RequestName, request: RequestBuilder) -> ApiResponse {
        transaction(&self.recorder, self.limiter.as_ref(), name, async move {
            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_else(|err| {
                        debug!(request = %name, "Unable to read response body: {err}");
                        String::new()
                    });
                    ApiResponse::new(status, body)
                }
                Err(err) => {
                    warn!(request = %name, "Request failed: {err}");
                    ApiResponse::new(0, err.to_string())
                }
            }
        })
        .await
    }
}

impl TaskApi for HttpTaskApi {
    async fn register(&self, user: &NewUser) -> ApiResponse {
        let request = self.client.post(self.url("/users")).json(user);
        self.send(RequestName::Register, request).await
    }

    async fn login(&self, login: &Login) -> ApiResponse {
        let request = self.client.post(self.url("/login")).json(login);
        self.send(RequestName::Login, request).await
    }

    async fn create_task(&self, token: &str, task: &TaskPayload) -> ApiResponse {
        let request = self
            .client
            .post(self.url("/tasks"))
            .bearer_auth(token)
            .json(task);
        self.send(RequestName::Create, request).await
    }

    async fn update_task(&self, token: &str, id: &str, task: &TaskPayload) -> ApiResponse {
        let request = self
            .client
            .put(self.task_url(id))
            .bearer_auth(token)
            .json(task);
        self.send(RequestName::Update, request).await
    }

    async fn get_task(&self, token: &str, id: &str) -> ApiResponse {
        let request = self.client.get(self.task_url(id)).bearer_auth(token);
        self.send(RequestName::Get, request).await
    }

    async fn delete_task(&self, token: &str, id: &str) -> ApiResponse {
        let request = self.client.delete(self.task_url(id)).bearer_auth(token);
        self.send(RequestName::Delete, request).await
    }
}
