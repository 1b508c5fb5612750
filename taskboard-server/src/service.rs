//! Task mutations and reads for one owner.
//!
//! Every mutation validates its input first, then runs in a single store
//! transaction. An error on any path drops the transaction, so a failed
//! create or update leaves no task, tag, or link behind.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use taskboard_proto::api::{
    CreateTagRequest, CreateTaskRequest, UpdateTaskRequest, ValidationError, validate_title,
};
use taskboard_proto::task::{OwnerId, Tag, Task, TaskId};

use crate::clock::{Clock, SystemClock};
use crate::query::TaskQuery;
use crate::store::{ReadSession, Store, StoreError, TaskRow, WriteSession};
use crate::tags;

/// Errors from task operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Input was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The task does not exist for this owner.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// Storage failed.
    #[error("unexpected storage failure: {0}")]
    Unexpected(#[from] StoreError),
}

/// Task operations bound to one owner.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    owner: OwnerId,
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl TaskService {
    /// Creates a service using the system clock.
    #[must_use]
    pub fn new(store: Arc<Store>, owner: OwnerId) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), owner)
    }

    /// Creates a service reading time from `clock`.
    #[must_use]
    pub fn with_clock(store: Arc<Store>, clock: Arc<dyn Clock>, owner: OwnerId) -> Self {
        Self {
            store,
            clock,
            owner,
        }
    }

    /// The owner every operation is scoped to.
    #[must_use]
    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Creates a task.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for a bad title, description or tag
    /// name; [`ServiceError::Unexpected`] if storage fails.
    pub async fn create(&self, request: CreateTaskRequest) -> Result<Task, ServiceError> {
        request.validate()?;
        let title = validate_title(&request.title).map_err(ValidationError::from)?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await;
        let tags = match &request.tags {
            Some(names) => tags::resolve(&mut *tx, names, &self.owner)?,
            None => Vec::new(),
        };
        let row = TaskRow {
            id: TaskId::new(),
            owner_id: self.owner.clone(),
            title,
            description: request.description.unwrap_or_default(),
            completed: false,
            priority: request.priority.unwrap_or_default(),
            due_date: request.due_date,
            created_at: now,
            updated_at: now,
        };
        let id = row.id;
        tx.insert_task(row.clone())?;
        tx.set_task_tags(&id, &tag_ids(&tags))?;
        let task = tx.hydrate(&row);
        tx.commit()?;

        tracing::info!(task_id = %id, owner = %self.owner, tags = tags.len(), "task created");
        Ok(task)
    }

    /// Fetches one task.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when the task does not exist for the owner.
    pub async fn get(&self, id: TaskId) -> Result<Task, ServiceError> {
        let snapshot = self.store.snapshot().await;
        snapshot
            .task(&self.owner, &id)
            .map(|row| snapshot.hydrate(row))
            .ok_or(ServiceError::NotFound(id))
    }

    /// Applies a partial update.
    ///
    /// Only fields present in `request` change. A present `tags` list
    /// replaces every link of the task, and `updatedAt` always moves forward.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when the task does not exist;
    /// [`ServiceError::Validation`] for bad or missing fields.
    pub async fn update(&self, id: TaskId, request: UpdateTaskRequest) -> Result<Task, ServiceError> {
        request.validate()?;
        let title = request
            .title
            .as_deref()
            .map(validate_title)
            .transpose()
            .map_err(ValidationError::from)?;

        let mut tx = self.store.begin().await;
        let mut row = tx
            .task(&self.owner, &id)
            .cloned()
            .ok_or(ServiceError::NotFound(id))?;

        if let Some(title) = title {
            row.title = title;
        }
        if let Some(description) = request.description {
            row.description = description;
        }
        if let Some(completed) = request.completed {
            row.completed = completed;
        }
        if let Some(priority) = request.priority {
            row.priority = priority;
        }
        if let Some(due_date) = request.due_date {
            row.due_date = due_date;
        }
        row.updated_at = next_stamp(self.clock.now(), row.updated_at);

        tx.update_task(row.clone())?;
        if let Some(names) = &request.tags {
            let tags = tags::resolve(&mut *tx, names, &self.owner)?;
            tx.set_task_tags(&id, &tag_ids(&tags))?;
        }
        let task = tx.hydrate(&row);
        tx.commit()?;

        tracing::info!(task_id = %id, owner = %self.owner, "task updated");
        Ok(task)
    }

    /// Deletes a task and its tag links. Tags themselves are kept.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when the task does not exist.
    pub async fn delete(&self, id: TaskId) -> Result<bool, ServiceError> {
        let mut tx = self.store.begin().await;
        match tx.delete_task(&self.owner, &id) {
            Ok(_) => {}
            Err(StoreError::MissingTask(_)) => return Err(ServiceError::NotFound(id)),
            Err(e) => return Err(e.into()),
        }
        tx.commit()?;
        tracing::info!(task_id = %id, owner = %self.owner, "task deleted");
        Ok(true)
    }

    /// Lists tasks matching `query`, returning one page and the unpaged total.
    pub async fn list(&self, query: &TaskQuery) -> (Vec<Task>, usize) {
        let snapshot = self.store.snapshot().await;
        query.execute(&*snapshot, &self.owner)
    }

    /// Lists the owner's tags.
    pub async fn tags(&self) -> Vec<Tag> {
        let snapshot = self.store.snapshot().await;
        tags::list_tags(&*snapshot, &self.owner)
    }

    /// Creates a tag, or returns the existing one with the same name.
    ///
    /// The boolean is `true` when a new tag was created.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Validation`] for a bad name or color.
    pub async fn create_tag(&self, request: &CreateTagRequest) -> Result<(Tag, bool), ServiceError> {
        let mut tx = self.store.begin().await;
        let (tag, created) = tags::create_tag(&mut *tx, request, &self.owner)?;
        if created {
            tx.commit()?;
            tracing::info!(tag_id = %tag.id, owner = %self.owner, "tag created");
        }
        Ok((tag, created))
    }
}

fn tag_ids(tags: &[Tag]) -> Vec<taskboard_proto::task::TagId> {
    tags.iter().map(|t| t.id).collect()
}

/// Returns a modification stamp strictly after `previous`, even if the clock
/// has not moved or went backwards.
fn next_stamp(now: DateTime<Utc>, previous: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
