//! HTTP surface: shared state, JSON handlers, error mapping, and server
//! startup.
//!
//! Routes are mounted both at the root and under `/api/v1`. Every non-2xx
//! response carries an [`ErrorBody`], including unknown paths, unsupported
//! methods and oversized bodies.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use taskboard_proto::api::{
    CreateTagRequest, CreateTaskRequest, DeleteTaskResponse, ErrorBody, HealthResponse,
    INTERNAL_ERROR, METHOD_NOT_ALLOWED, NOT_FOUND, PAYLOAD_TOO_LARGE, TaskListResponse,
    UpdateTaskRequest, ValidationError,
};
use taskboard_proto::task::{Tag, Task, TaskId};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::query::TaskQuery;
use crate::service::{ServiceError, TaskService};
use crate::store::Store;

/// Shared server state.
#[derive(Debug)]
pub struct AppState {
    service: TaskService,
    max_page_size: usize,
    max_body_size: usize,
    cors_origins: Vec<String>,
}

impl Default for AppState {
    fn default() -> Self {
        let config = ServerConfig::default();
        Self::with_config(
            TaskService::new(Arc::new(Store::new()), config.owner_id.clone()),
            &config,
        )
    }
}

impl AppState {
    /// Creates state around `service` with default limits.
    #[must_use]
    pub fn new(service: TaskService) -> Self {
        Self::with_config(service, &ServerConfig::default())
    }

    /// Creates state around `service` with limits from `config`.
    #[must_use]
    pub fn with_config(service: TaskService, config: &ServerConfig) -> Self {
        Self {
            service,
            max_page_size: config.max_page_size,
            max_body_size: config.max_body_size,
            cors_origins: config.cors_origins.clone(),
        }
    }

    /// Creates state with an empty store for the configured owner.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::with_config(
            TaskService::new(Arc::new(Store::new()), config.owner_id.clone()),
            config,
        )
    }

    /// The task service behind the handlers.
    #[must_use]
    pub const fn service(&self) -> &TaskService {
        &self.service
    }
}

/// Failure of a request, rendered as an [`ErrorBody`].
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// A service-level failure.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// The path did not hold a task id.
    #[error("malformed task id: {0}")]
    MalformedId(String),
    /// No route matches the path.
    #[error("no route for {0}")]
    UnknownRoute(String),
    /// The path exists but not for this method.
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
    /// The body exceeded the configured limit.
    #[error("request body too large")]
    PayloadTooLarge,
}

impl From<ValidationError> for HttpError {
    fn from(e: ValidationError) -> Self {
        Self::Service(e.into())
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::PayloadTooLarge;
        }
        ValidationError::single("body", rejection.body_text()).into()
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        ValidationError::single("query", rejection.body_text()).into()
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Service(ServiceError::Validation(e)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorBody::validation(&e))
            }
            Self::Service(ServiceError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                ErrorBody::new(NOT_FOUND, format!("task {id} not found")),
            ),
            Self::MalformedId(raw) => (
                StatusCode::NOT_FOUND,
                ErrorBody::new(NOT_FOUND, format!("task {raw} not found")),
            ),
            Self::UnknownRoute(path) => (
                StatusCode::NOT_FOUND,
                ErrorBody::new(NOT_FOUND, format!("no route for {path}")),
            ),
            Self::MethodNotAllowed(method) => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorBody::new(METHOD_NOT_ALLOWED, format!("method {method} not allowed")),
            ),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody::new(PAYLOAD_TOO_LARGE, "request body too large"),
            ),
            Self::Service(ServiceError::Unexpected(e)) => {
                tracing::error!(error = %e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new(INTERNAL_ERROR, "internal server error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn parse_id(raw: &str) -> Result<TaskId, HttpError> {
    raw.parse()
        .map_err(|_| HttpError::MalformedId(raw.to_string()))
}

type Shared = State<Arc<AppState>>;

async fn create_task(
    State(state): Shared,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), HttpError> {
    let Json(request) = payload?;
    let task = state.service.create(request).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(
    State(state): Shared,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<TaskListResponse>, HttpError> {
    let Query(pairs) = params?;
    let query = TaskQuery::from_params(&pairs, state.max_page_size)?;
    let (tasks, total) = state.service.list(&query).await;
    Ok(Json(TaskListResponse {
        tasks,
        total,
        limit: query.limit,
        offset: query.offset,
    }))
}

async fn get_task(State(state): Shared, Path(id): Path<String>) -> Result<Json<Task>, HttpError> {
    let id = parse_id(&id)?;
    Ok(Json(state.service.get(id).await?))
}

async fn update_task(
    State(state): Shared,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<Task>, HttpError> {
    let id = parse_id(&id)?;
    let Json(request) = payload?;
    Ok(Json(state.service.update(id, request).await?))
}

async fn delete_task(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<DeleteTaskResponse>, HttpError> {
    let id = parse_id(&id)?;
    let deleted = state.service.delete(id).await?;
    Ok(Json(DeleteTaskResponse { deleted, id }))
}

async fn list_tags(State(state): Shared) -> Json<Vec<Tag>> {
    Json(state.service.tags().await)
}

async fn create_tag(
    State(state): Shared,
    payload: Result<Json<CreateTagRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Tag>), HttpError> {
    let Json(request) = payload?;
    let (tag, created) = state.service.create_tag(&request).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(tag)))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn unknown_route(uri: Uri) -> HttpError {
    HttpError::UnknownRoute(uri.path().to_string())
}

async fn method_not_allowed(method: Method) -> HttpError {
    HttpError::MethodNotAllowed(method)
}

/// Gives the limit layer's plain-text 413 the JSON error shape.
async fn json_payload_too_large(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE && !is_json {
        return HttpError::PayloadTooLarge.into_response();
    }
    response
}

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tags", get(list_tags).post(create_tag))
        .route("/health", get(health))
        .method_not_allowed_fallback(method_not_allowed)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]);
    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Builds the application router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let api = routes();
    Router::new()
        .merge(api.clone())
        .nest("/api/v1", api)
        .fallback(unknown_route)
        .layer(RequestBodyLimitLayer::new(state.max_body_size))
        .layer(map_response(json_payload_too_large))
        .layer(cors_layer(&state.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the server on `addr` with an empty store and default settings,
/// returning the bound address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(AppState::default())).await
}

/// Starts the server with a pre-built [`AppState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<AppState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Starts the server in-process on an OS-assigned port for testing.
#[cfg(test)]
pub async fn start_test_server() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    start_server("127.0.0.1:0")
        .await
        .expect("failed to start test server")
}
