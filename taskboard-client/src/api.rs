//! Client side of the task API.
//!
//! [`TaskApi`] is the seam the board talks through. [`HttpTaskApi`] speaks
//! JSON over HTTP to a Taskboard server; tests substitute scripted
//! implementations.

use std::future::Future;

use serde::de::DeserializeOwned;
use taskboard_proto::api::{
    CreateTaskRequest, DeleteTaskResponse, ErrorBody, FieldError, TaskListResponse,
    UpdateTaskRequest,
};
use taskboard_proto::query::ListQuery;
use taskboard_proto::task::{Task, TaskId};

/// Errors returned by a [`TaskApi`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server rejected the input (422).
    #[error("validation failed: {message}")]
    Validation {
        /// Server message.
        message: String,
        /// Field-level failures.
        details: Vec<FieldError>,
    },
    /// The task does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),
    /// Any other non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server message, if one could be read.
        message: String,
    },
    /// The request never produced a response, or the body was unreadable.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Async access to the task API.
pub trait TaskApi: Send + Sync {
    /// Fetches one page of tasks.
    fn list(
        &self,
        query: &ListQuery,
    ) -> impl Future<Output = Result<TaskListResponse, ApiError>> + Send;

    /// Creates a task.
    fn create(
        &self,
        request: &CreateTaskRequest,
    ) -> impl Future<Output = Result<Task, ApiError>> + Send;

    /// Applies a partial update and returns the stored task.
    fn update(
        &self,
        id: TaskId,
        request: &UpdateTaskRequest,
    ) -> impl Future<Output = Result<Task, ApiError>> + Send;

    /// Deletes a task.
    fn delete(&self, id: TaskId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// [`TaskApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTaskApi {
    /// Creates a client for the server at `base_url`
    /// (e.g. `http://127.0.0.1:8000/api/v1`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body: Option<ErrorBody> = response.json().await.ok();
    let message = body
        .as_ref()
        .map_or_else(|| status.to_string(), |b| b.error.message.clone());
    tracing::debug!(status = status.as_u16(), message = %message, "request rejected");

    Err(match status.as_u16() {
        422 => ApiError::Validation {
            message,
            details: body.and_then(|b| b.error.details).unwrap_or_default(),
        },
        404 => ApiError::NotFound(message),
        code => ApiError::Status {
            status: code,
            message,
        },
    })
}

impl TaskApi for HttpTaskApi {
    async fn list(&self, query: &ListQuery) -> Result<TaskListResponse, ApiError> {
        let response = self
            .client
            .get(self.url("/tasks"))
            .query(&query.to_pairs())
            .send()
            .await?;
        decode(response).await
    }

    async fn create(&self, request: &CreateTaskRequest) -> Result<Task, ApiError> {
        let response = self
            .client
            .post(self.url("/tasks"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn update(&self, id: TaskId, request: &UpdateTaskRequest) -> Result<Task, ApiError> {
        let response = self
            .client
            .patch(self.url(&format!("/tasks/{id}")))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn delete(&self, id: TaskId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(&format!("/tasks/{id}")))
            .send()
            .await?;
        let _: DeleteTaskResponse = decode(response).await?;
        Ok(())
    }
}
