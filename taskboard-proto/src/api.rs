//! Request and response bodies for the Taskboard HTTP API.
//!
//! Request types are validated here, at the boundary, so the server's
//! mutation service only ever sees already-checked values. Every validator
//! reports failures as [`FieldError`]s so a 422 response can point at the
//! offending field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::task::{
    MAX_TAG_COLOR_LENGTH, MAX_TAG_NAME_LENGTH, MAX_TASK_DESCRIPTION_LENGTH, MAX_TASK_TITLE_LENGTH,
    Priority, Tag, Task, TaskId,
};

/// Error code for malformed or out-of-range input (HTTP 422).
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Error code for a referenced id that does not exist (HTTP 404).
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Error code for storage or other unexpected failures (HTTP 500).
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// Error code for a known path requested with an unsupported method (HTTP 405).
pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";
/// Error code for a request body over the configured limit (HTTP 413).
pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the offending field (e.g. `title`, `tags[2]`, `limit`).
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// One or more field-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation failed: {}", summarize(.errors))]
pub struct ValidationError {
    /// Every failure found, in field order.
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Creates a validation error from a list of field errors.
    #[must_use]
    pub const fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Creates a validation error with a single field error.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![FieldError::new(field, message)])
    }

    /// Returns `true` if the given field has at least one error.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl From<FieldError> for ValidationError {
    fn from(error: FieldError) -> Self {
        Self::new(vec![error])
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects field errors and turns them into a `Result` at the end.
#[derive(Debug, Default)]
struct Collector {
    errors: Vec<FieldError>,
}

impl Collector {
    fn check<T>(&mut self, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Field validators
// ---------------------------------------------------------------------------

/// Validates and trims a task title.
///
/// # Errors
///
/// Returns a [`FieldError`] on `title` if the trimmed title is empty or
/// longer than [`MAX_TASK_TITLE_LENGTH`] characters.
pub fn validate_title(raw: &str) -> Result<String, FieldError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(FieldError::new("title", "title cannot be empty"));
    }
    if title.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(FieldError::new(
            "title",
            format!("title too long (max {MAX_TASK_TITLE_LENGTH} characters)"),
        ));
    }
    Ok(title.to_string())
}

/// Validates a task description.
///
/// # Errors
///
/// Returns a [`FieldError`] on `description` if it is longer than
/// [`MAX_TASK_DESCRIPTION_LENGTH`] characters.
pub fn validate_description(raw: &str) -> Result<(), FieldError> {
    if raw.chars().count() > MAX_TASK_DESCRIPTION_LENGTH {
        return Err(FieldError::new(
            "description",
            format!("description too long (max {MAX_TASK_DESCRIPTION_LENGTH} characters)"),
        ));
    }
    Ok(())
}

/// Validates and trims a tag name, reporting failures under `field`.
///
/// # Errors
///
/// Returns a [`FieldError`] if the trimmed name is empty or longer than
/// [`MAX_TAG_NAME_LENGTH`] characters.
pub fn validate_tag_name(raw: &str, field: &str) -> Result<String, FieldError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(FieldError::new(field, "tag name cannot be empty"));
    }
    if name.chars().count() > MAX_TAG_NAME_LENGTH {
        return Err(FieldError::new(
            field,
            format!("tag name too long (max {MAX_TAG_NAME_LENGTH} characters)"),
        ));
    }
    Ok(name.to_string())
}

/// Validates a list of tag names, reporting failures as `tags[i]`.
///
/// # Errors
///
/// Returns every failing entry in one [`ValidationError`].
pub fn validate_tag_names(names: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut collector = Collector::default();
    let trimmed: Vec<String> = names
        .iter()
        .enumerate()
        .filter_map(|(i, n)| collector.check(validate_tag_name(n, &format!("tags[{i}]"))))
        .collect();
    collector.finish().map(|()| trimmed)
}

/// Validates a tag color hint of the form `#RRGGBB`.
///
/// # Errors
///
/// Returns a [`FieldError`] on `color` if the value is not a `#` followed by
/// six hex digits.
pub fn validate_tag_color(raw: &str) -> Result<(), FieldError> {
    let valid = raw.len() == MAX_TAG_COLOR_LENGTH
        && raw.starts_with('#')
        && raw[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(FieldError::new("color", "color must look like #RRGGBB"))
    }
}

// ---------------------------------------------------------------------------
// Task requests
// ---------------------------------------------------------------------------

/// Body of `POST /tasks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// Task title; trimmed by the server.
    pub title: String,
    /// Optional description (defaults to empty).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional priority (defaults to medium).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Optional due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    /// Tag names to resolve or create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl CreateTaskRequest {
    /// Creates a request with just a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Sets the tag names.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Checks every field constraint and reports all failures together.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing each invalid field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut collector = Collector::default();
        collector.check(validate_title(&self.title));
        if let Some(description) = &self.description {
            collector.check(validate_description(description));
        }
        if let Some(tags) = &self.tags
            && let Err(e) = validate_tag_names(tags)
        {
            collector.errors.extend(e.errors);
        }
        collector.finish()
    }
}

/// Body of `PATCH /tasks/{id}`; every field is optional.
///
/// `due_date` distinguishes "absent" (`None`, leave untouched) from an
/// explicit `null` (`Some(None)`, clear the due date).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New completion state (a target value, never a toggle).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// New priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// New due date, or `Some(None)` to clear it.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<DateTime<Utc>>>,
    /// Full replacement tag set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl UpdateTaskRequest {
    /// A request that only sets the completion state.
    #[must_use]
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    /// A request that only sets the title.
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Returns `true` if no field is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.tags.is_none()
    }

    /// Checks every present field and reports all failures together.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if no field is present or any present
    /// field violates its constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::single(
                "body",
                "at least one field must be provided",
            ));
        }
        let mut collector = Collector::default();
        if let Some(title) = &self.title {
            collector.check(validate_title(title));
        }
        if let Some(description) = &self.description {
            collector.check(validate_description(description));
        }
        if let Some(tags) = &self.tags
            && let Err(e) = validate_tag_names(tags)
        {
            collector.errors.extend(e.errors);
        }
        collector.finish()
    }
}

/// Maps any present JSON value (including `null`) to `Some(..)`.
fn present_or_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Tag requests
// ---------------------------------------------------------------------------

/// Body of `POST /tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTagRequest {
    /// Tag name; trimmed by the server, casing preserved.
    pub name: String,
    /// Optional `#RRGGBB` color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CreateTagRequest {
    /// Checks the name and color.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing each invalid field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut collector = Collector::default();
        collector.check(validate_tag_name(&self.name, "name"));
        if let Some(color) = &self.color {
            collector.check(validate_tag_color(color));
        }
        collector.finish()
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Body of `GET /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListResponse {
    /// The requested page.
    pub tasks: Vec<Task>,
    /// Size of the filtered set before pagination.
    pub total: usize,
    /// Effective page size.
    pub limit: usize,
    /// Effective offset.
    pub offset: usize,
}

/// Body of `DELETE /tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTaskResponse {
    /// Always `true` on success.
    pub deleted: bool,
    /// The removed task.
    pub id: TaskId,
}

/// Body of `GET /tags`.
pub type TagListResponse = Vec<Tag>;

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when the service is up.
    pub status: String,
    /// Server version.
    pub version: String,
}

/// Error payload carried inside [`ErrorBody`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code (`VALIDATION_ERROR`, `NOT_FOUND`, `INTERNAL_ERROR`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Field-level failures for validation errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// The error.
    pub error: ErrorDetail,
}

impl ErrorBody {
    /// Creates an error body with no field details.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Creates a `VALIDATION_ERROR` body carrying field details.
    #[must_use]
    pub fn validation(error: &ValidationError) -> Self {
        Self {
            error: ErrorDetail {
                code: VALIDATION_ERROR.to_string(),
                message: error.to_string(),
                details: Some(error.errors.clone()),
            },
        }
    }
}
