use crate::error::AppError;
use crate::model::{NewTask, Task, TaskUpdate};
use crate::storage::TaskStore;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const TASKS_PATH: &str = "/api/tasks";

/// Task store reached over the backend's REST API with bearer-token auth.
#[derive(Debug, Clone)]
pub struct HttpTaskStore {
    client: Client,
    base_url: String,
}

impl HttpTaskStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::transport(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "task store request");
        self.client.request(method, url).bearer_auth(token)
    }

    async fn send(request: RequestBuilder) -> Result<Response, AppError> {
        let response = request.send().await.map_err(|err| {
            warn!(error = %err, "task store unreachable");
            AppError::from(err)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), %body, "task store rejected request");
        Err(AppError::remote(status.as_u16(), body))
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AppError> {
        let response = Self::send(request).await?;
        response.json::<T>().await.map_err(AppError::from)
    }
}

#[async_trait]
impl TaskStore for HttpTaskStore {
    async fn create(&self, token: &str, task: &NewTask) -> Result<Task, AppError> {
        let request = self
            .request(Method::POST, &format!("{TASKS_PATH}/"), token)
            .json(task);
        Self::send_json(request).await
    }

    async fn list(&self, token: &str) -> Result<Vec<Task>, AppError> {
        let request = self.request(Method::GET, &format!("{TASKS_PATH}/"), token);
        Self::send_json(request).await
    }

    async fn get(&self, token: &str, id: i64) -> Result<Task, AppError> {
        let request = self.request(Method::GET, &format!("{TASKS_PATH}/{id}"), token);
        Self::send_json(request).await
    }

    async fn update(&self, token: &str, id: i64, update: &TaskUpdate) -> Result<Task, AppError> {
        let request = self
            .request(Method::PUT, &format!("{TASKS_PATH}/{id}"), token)
            .json(update);
        Self::send_json(request).await
    }

    async fn delete(&self, token: &str, id: i64) -> Result<(), AppError> {
        let request = self.request(Method::DELETE, &format!("{TASKS_PATH}/{id}"), token);
        Self::send(request).await.map(|_| ())
    }
}
