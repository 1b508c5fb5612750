//! The displayed task list and its optimistic mutations.
//!
//! [`TaskBoard`] keeps one [`Row`] per task. Completion and title changes
//! are shown before the server confirms them and reverted if it refuses.
//! Failures are logged and surfaced as [`Notice`] values on a channel; they
//! are never retried automatically.
//!
//! A change is driven in three steps so several can be in flight from one
//! task: `begin_*` applies it and returns a [`Mutation`], [`TaskBoard::send`]
//! performs the request, and [`TaskBoard::settle`] applies the answer. The
//! convenience methods ([`TaskBoard::toggle_completed`], [`TaskBoard::rename`])
//! run all three.

use taskboard_proto::api::{CreateTaskRequest, UpdateTaskRequest};
use taskboard_proto::query::ListQuery;
use taskboard_proto::task::{Task, TaskId};
use tokio::sync::mpsc;

use crate::api::{ApiError, TaskApi};
use crate::optimistic::{Begin, ConcurrencyPolicy, Optimistic, OptimisticError, Resolution, Ticket};

/// A user-facing failure report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Loading the list failed.
    RefreshFailed {
        /// Description of the error.
        reason: String,
    },
    /// A completion change was refused and reverted.
    ToggleFailed {
        /// The affected task.
        task_id: TaskId,
        /// Description of the error.
        reason: String,
    },
    /// A title change was refused and reverted.
    RenameFailed {
        /// The affected task.
        task_id: TaskId,
        /// Description of the error.
        reason: String,
    },
    /// Creating a task failed.
    CreateFailed {
        /// Description of the error.
        reason: String,
    },
    /// Deleting a task failed; the row was restored.
    DeleteFailed {
        /// The affected task.
        task_id: TaskId,
        /// Description of the error.
        reason: String,
    },
}

/// Errors from board operations.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// The task is not on the board.
    #[error("task {0} is not on the board")]
    UnknownTask(TaskId),
    /// The change could not start.
    #[error(transparent)]
    Optimistic(#[from] OptimisticError),
    /// The server refused the request or could not be reached.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A field change on one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Set the completion flag.
    Completed(bool),
    /// Set the title.
    Title(String),
}

/// A change that has been applied locally and must be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    task_id: TaskId,
    ticket: Ticket,
    change: Change,
}

impl Mutation {
    /// The task being changed.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// The requested change.
    #[must_use]
    pub const fn change(&self) -> &Change {
        &self.change
    }

    /// The request body carrying the target value.
    #[must_use]
    pub fn request(&self) -> UpdateTaskRequest {
        match &self.change {
            Change::Completed(completed) => UpdateTaskRequest::completed(*completed),
            Change::Title(title) => UpdateTaskRequest::title(title.clone()),
        }
    }
}

/// One displayed task.
#[derive(Debug, Clone)]
pub struct Row {
    task: Task,
    completed: Optimistic<bool>,
    title: Optimistic<String>,
}

impl Row {
    fn new(task: Task, policy: ConcurrencyPolicy) -> Self {
        Self {
            completed: Optimistic::new(task.completed, policy),
            title: Optimistic::new(task.title.clone(), policy),
            task,
        }
    }

    /// The last task state the server reported.
    #[must_use]
    pub const fn task(&self) -> &Task {
        &self.task
    }

    /// The displayed completion state.
    #[must_use]
    pub const fn completed(&self) -> bool {
        *self.completed.value()
    }

    /// The displayed title.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.value()
    }

    /// Returns `true` while any change to this row is in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.completed.is_pending() || self.title.is_pending()
    }

    fn reset(&mut self, task: Task) {
        self.completed.reset(task.completed);
        self.title.reset(task.title.clone());
        self.task = task;
    }
}

/// The task list as the user sees it.
pub struct TaskBoard<A: TaskApi> {
    api: A,
    rows: Vec<Row>,
    total: usize,
    policy: ConcurrencyPolicy,
    notices: mpsc::Sender<Notice>,
}

impl<A: TaskApi> TaskBoard<A> {
    /// Creates an empty board.
    ///
    /// Returns the board and a receiver for [`Notice`] events.
    #[must_use]
    pub fn new(
        api: A,
        policy: ConcurrencyPolicy,
        notice_buffer: usize,
    ) -> (Self, mpsc::Receiver<Notice>) {
        let (tx, rx) = mpsc::channel(notice_buffer);
        let board = Self {
            api,
            rows: Vec::new(),
            total: 0,
            policy,
            notices: tx,
        };
        (board, rx)
    }

    /// The displayed rows, in list order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The displayed row for `id`.
    #[must_use]
    pub fn row(&self, id: TaskId) -> Option<&Row> {
        self.rows.iter().find(|row| row.task.id == id)
    }

    /// Total matching tasks on the server at the last refresh, adjusted for
    /// local creates and deletes.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    fn row_mut(&mut self, id: TaskId) -> Result<&mut Row, BoardError> {
        self.rows
            .iter_mut()
            .find(|row| row.task.id == id)
            .ok_or(BoardError::UnknownTask(id))
    }

    fn notify(&self, notice: Notice) {
        // Best effort: a full channel drops the notice.
        let _ = self.notices.try_send(notice);
    }

    /// Replaces the rows with the server's answer to `query`.
    ///
    /// Rows that survive keep their identity; their pending changes are
    /// dropped and any answer still on the way is ignored.
    ///
    /// # Errors
    ///
    /// [`BoardError::Api`] if the list could not be loaded; the rows are
    /// left as they were.
    pub async fn refresh(&mut self, query: &ListQuery) -> Result<(), BoardError> {
        let page = match self.api.list(query).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "task list refresh failed");
                self.notify(Notice::RefreshFailed {
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let mut previous = std::mem::take(&mut self.rows);
        self.rows = page
            .tasks
            .into_iter()
            .map(|task| {
                match previous.iter().position(|row| row.task.id == task.id) {
                    Some(i) => {
                        let mut row = previous.swap_remove(i);
                        row.reset(task);
                        row
                    }
                    None => Row::new(task, self.policy),
                }
            })
            .collect();
        self.total = page.total;
        tracing::debug!(rows = self.rows.len(), total = self.total, "task list refreshed");
        Ok(())
    }

    /// Shows the opposite of the latest requested completion state of `id`
    /// and returns the mutation to send, or `None` if it was queued behind
    /// one in flight.
    ///
    /// # Errors
    ///
    /// [`BoardError::UnknownTask`], or [`OptimisticError::Busy`] under
    /// [`ConcurrencyPolicy::Reject`].
    pub fn begin_toggle(&mut self, id: TaskId) -> Result<Option<Mutation>, BoardError> {
        let row = self.row_mut(id)?;
        let target = !row.completed();
        Ok(match row.completed.begin(target)? {
            Begin::Started(ticket) => Some(Mutation {
                task_id: id,
                ticket,
                change: Change::Completed(target),
            }),
            Begin::Queued => None,
        })
    }

    /// Shows `title` for `id` and returns the mutation to send, or `None`
    /// if it was queued.
    ///
    /// # Errors
    ///
    /// As for [`begin_toggle`](Self::begin_toggle).
    pub fn begin_rename(
        &mut self,
        id: TaskId,
        title: impl Into<String>,
    ) -> Result<Option<Mutation>, BoardError> {
        let title = title.into();
        let row = self.row_mut(id)?;
        Ok(match row.title.begin(title.clone())? {
            Begin::Started(ticket) => Some(Mutation {
                task_id: id,
                ticket,
                change: Change::Title(title),
            }),
            Begin::Queued => None,
        })
    }

    /// Sends `mutation` to the server.
    ///
    /// # Errors
    ///
    /// Whatever the API returns.
    pub async fn send(&self, mutation: &Mutation) -> Result<Task, ApiError> {
        self.api
            .update(mutation.task_id, &mutation.request())
            .await
    }

    /// Applies the server's answer to `mutation`.
    ///
    /// Returns a queued mutation that became current and must be sent next.
    /// Answers for rows no longer on the board, or for superseded changes,
    /// are ignored.
    ///
    /// # Errors
    ///
    /// [`BoardError::Api`] when the change was refused; the row has been
    /// reverted and a [`Notice`] emitted.
    pub fn settle(
        &mut self,
        mutation: Mutation,
        outcome: Result<Task, ApiError>,
    ) -> Result<Option<Mutation>, BoardError> {
        let Mutation {
            task_id,
            ticket,
            change,
        } = mutation;
        let Some(row) = self.rows.iter_mut().find(|row| row.task.id == task_id) else {
            tracing::debug!(task_id = %task_id, "answer for a task no longer displayed");
            return Ok(None);
        };

        let (task, error) = match outcome {
            Ok(task) => (Some(task), None),
            Err(e) => (None, Some(e)),
        };

        let settled = match &change {
            Change::Completed(_) => {
                let value = task.as_ref().is_some_and(|t| t.completed);
                let resolution = row.completed.resolve(ticket, error.map_or(Ok(value), Err));
                map_resolution(resolution, Change::Completed)
            }
            Change::Title(_) => {
                let value = task.as_ref().map(|t| t.title.clone()).unwrap_or_default();
                let resolution = row.title.resolve(ticket, error.map_or(Ok(value), Err));
                map_resolution(resolution, Change::Title)
            }
        };

        match settled {
            Settled::Stale => Ok(None),
            Settled::Confirmed(next) => {
                if let Some(task) = task {
                    row.task = task;
                }
                Ok(next.map(|(ticket, change)| Mutation {
                    task_id,
                    ticket,
                    change,
                }))
            }
            Settled::RolledBack(error) => {
                tracing::warn!(task_id = %task_id, error = %error, "change refused, reverted");
                let reason = error.to_string();
                self.notify(match change {
                    Change::Completed(_) => Notice::ToggleFailed { task_id, reason },
                    Change::Title(_) => Notice::RenameFailed { task_id, reason },
                });
                Err(error.into())
            }
        }
    }

    async fn drive(&mut self, first: Option<Mutation>) -> Result<(), BoardError> {
        let mut next = first;
        while let Some(mutation) = next {
            let outcome = self.send(&mutation).await;
            next = self.settle(mutation, outcome)?;
        }
        Ok(())
    }

    /// Flips the completion state of `id`, sending the new value (never a
    /// "toggle" instruction) and waiting for the answer.
    ///
    /// # Errors
    ///
    /// As for [`begin_toggle`](Self::begin_toggle) and
    /// [`settle`](Self::settle).
    pub async fn toggle_completed(&mut self, id: TaskId) -> Result<(), BoardError> {
        let mutation = self.begin_toggle(id)?;
        self.drive(mutation).await
    }

    /// Renames `id` and waits for the answer.
    ///
    /// # Errors
    ///
    /// As for [`begin_rename`](Self::begin_rename) and
    /// [`settle`](Self::settle).
    pub async fn rename(&mut self, id: TaskId, title: impl Into<String>) -> Result<(), BoardError> {
        let mutation = self.begin_rename(id, title)?;
        self.drive(mutation).await
    }

    /// Creates a task and shows it at the top of the list.
    ///
    /// # Errors
    ///
    /// [`BoardError::Api`] if the server refused; a [`Notice`] is emitted.
    pub async fn create(&mut self, request: &CreateTaskRequest) -> Result<TaskId, BoardError> {
        match self.api.create(request).await {
            Ok(task) => {
                let id = task.id;
                self.rows.insert(0, Row::new(task, self.policy));
                self.total += 1;
                Ok(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "task creation failed");
                self.notify(Notice::CreateFailed {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Removes `id` from the list at once and deletes it on the server,
    /// putting the row back if that fails.
    ///
    /// # Errors
    ///
    /// [`BoardError::UnknownTask`], or [`BoardError::Api`] if the server
    /// refused; a [`Notice`] is emitted in that case.
    pub async fn delete(&mut self, id: TaskId) -> Result<(), BoardError> {
        let index = self
            .rows
            .iter()
            .position(|row| row.task.id == id)
            .ok_or(BoardError::UnknownTask(id))?;
        let row = self.rows.remove(index);
        self.total = self.total.saturating_sub(1);

        match self.api.delete(id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "task deletion failed, restored");
                self.rows.insert(index.min(self.rows.len()), row);
                self.total += 1;
                self.notify(Notice::DeleteFailed {
                    task_id: id,
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }
}

enum Settled {
    Confirmed(Option<(Ticket, Change)>),
    RolledBack(ApiError),
    Stale,
}

fn map_resolution<T>(resolution: Resolution<T, ApiError>, wrap: fn(T) -> Change) -> Settled {
    match resolution {
        Resolution::Confirmed => Settled::Confirmed(None),
        Resolution::Promoted { ticket, target } => Settled::Confirmed(Some((ticket, wrap(target)))),
        Resolution::RolledBack { error, .. } => Settled::RolledBack(error),
        Resolution::Stale => Settled::Stale,
    }
}
