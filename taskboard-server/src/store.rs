//! In-memory transactional storage for tasks, tags and their links.
//!
//! [`Store`] stands in for a relational database reached through a
//! session/transaction abstraction:
//!
//! - [`Store::snapshot`] takes a read lock and hands out a [`Snapshot`].
//! - [`Store::begin`] takes the write lock for the whole transaction and
//!   stages every change on a private copy of the tables. [`Transaction::commit`]
//!   swaps the copy in; dropping the transaction discards it.
//!
//! The tag table carries a unique index on `(owner, lower(name))`. Inserting
//! a tag whose name collides fails with [`StoreError::UniqueViolation`]
//! naming the existing row.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use taskboard_proto::task::{OwnerId, Priority, Tag, TagId, Task, TaskId};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Errors raised by storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A tag with the same case-insensitive name already exists for the owner.
    #[error("tag name already taken by {existing}")]
    UniqueViolation {
        /// The row that holds the name.
        existing: TagId,
    },
    /// A task with this id already exists.
    #[error("duplicate task id: {0}")]
    DuplicateTask(TaskId),
    /// The referenced task does not exist.
    #[error("task not found: {0}")]
    MissingTask(TaskId),
    /// The referenced tag does not exist.
    #[error("tag not found: {0}")]
    MissingTag(TagId),
    /// The store refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A stored task without its tag links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    /// Task id.
    pub id: TaskId,
    /// Owning principal.
    pub owner_id: OwnerId,
    /// Trimmed title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Completion flag.
    pub completed: bool,
    /// Priority.
    pub priority: Priority,
    /// Optional due date.
    pub due_date: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// A stored tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRow {
    /// Tag id.
    pub id: TagId,
    /// Owning principal.
    pub owner_id: OwnerId,
    /// Name as first spelled.
    pub name: String,
    /// Optional color hint.
    pub color: Option<String>,
    /// Insertion sequence; defines tag creation order.
    seq: u64,
}

impl TagRow {
    /// Converts the row into its wire form.
    #[must_use]
    pub fn to_tag(&self) -> Tag {
        Tag {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }
}

/// Values for a tag insert.
#[derive(Debug, Clone)]
pub struct NewTag {
    /// Owning principal.
    pub owner_id: OwnerId,
    /// Trimmed name, casing preserved.
    pub name: String,
    /// Optional color hint.
    pub color: Option<String>,
}

/// The tables behind a [`Store`].
#[derive(Debug, Clone, Default)]
pub struct Tables {
    tasks: HashMap<TaskId, TaskRow>,
    tags: HashMap<TagId, TagRow>,
    tag_names: HashMap<(OwnerId, String), TagId>,
    links: HashMap<TaskId, Vec<TagId>>,
    next_seq: u64,
}

fn name_key(owner: &OwnerId, name: &str) -> (OwnerId, String) {
    (owner.clone(), name.trim().to_lowercase())
}

/// Read access to stored rows.
pub trait ReadSession {
    /// Looks up one task of `owner`.
    fn task(&self, owner: &OwnerId, id: &TaskId) -> Option<&TaskRow>;

    /// Returns every task of `owner`, in no particular order.
    fn tasks(&self, owner: &OwnerId) -> Vec<&TaskRow>;

    /// Looks up a tag by id.
    fn tag(&self, id: &TagId) -> Option<&TagRow>;

    /// Looks up a tag of `owner` by case-insensitive name.
    fn tag_by_name(&self, owner: &OwnerId, name: &str) -> Option<&TagRow>;

    /// Returns every tag of `owner`, in no particular order.
    fn tags(&self, owner: &OwnerId) -> Vec<&TagRow>;

    /// Returns the tags linked to `task`, in tag creation order.
    fn tags_of(&self, task: &TaskId) -> Vec<&TagRow>;

    /// Builds the wire form of a task, tags included.
    fn hydrate(&self, row: &TaskRow) -> Task {
        Task {
            id: row.id,
            title: row.title.clone(),
            description: row.description.clone(),
            completed: row.completed,
            priority: row.priority,
            due_date: row.due_date,
            tags: self.tags_of(&row.id).into_iter().map(TagRow::to_tag).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            owner_id: row.owner_id.clone(),
        }
    }
}

/// Write access to stored rows.
pub trait WriteSession: ReadSession {
    /// Inserts a new task.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateTask`] if the id is taken.
    fn insert_task(&mut self, row: TaskRow) -> Result<(), StoreError>;

    /// Overwrites an existing task row.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingTask`] if the task does not exist for its owner.
    fn update_task(&mut self, row: TaskRow) -> Result<(), StoreError>;

    /// Removes a task and its links. Linked tags are kept.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingTask`] if the task does not exist for `owner`.
    fn delete_task(&mut self, owner: &OwnerId, id: &TaskId) -> Result<TaskRow, StoreError>;

    /// Inserts a tag, enforcing the case-insensitive name index.
    ///
    /// # Errors
    ///
    /// [`StoreError::UniqueViolation`] if the owner already has a tag whose
    /// name differs only in case.
    fn insert_tag(&mut self, tag: NewTag) -> Result<TagRow, StoreError>;

    /// Replaces every link of `task` with `tags`. Duplicate ids collapse.
    ///
    /// # Errors
    ///
    /// [`StoreError::MissingTask`] or [`StoreError::MissingTag`] if a
    /// referenced row does not exist.
    fn set_task_tags(&mut self, task: &TaskId, tags: &[TagId]) -> Result<(), StoreError>;
}

impl ReadSession for Tables {
    fn task(&self, owner: &OwnerId, id: &TaskId) -> Option<&TaskRow> {
        self.tasks.get(id).filter(|row| &row.owner_id == owner)
    }

    fn tasks(&self, owner: &OwnerId) -> Vec<&TaskRow> {
        self.tasks
            .values()
            .filter(|row| &row.owner_id == owner)
            .collect()
    }

    fn tag(&self, id: &TagId) -> Option<&TagRow> {
        self.tags.get(id)
    }

    fn tag_by_name(&self, owner: &OwnerId, name: &str) -> Option<&TagRow> {
        self.tag_names
            .get(&name_key(owner, name))
            .and_then(|id| self.tags.get(id))
    }

    fn tags(&self, owner: &OwnerId) -> Vec<&TagRow> {
        self.tags
            .values()
            .filter(|row| &row.owner_id == owner)
            .collect()
    }

    fn tags_of(&self, task: &TaskId) -> Vec<&TagRow> {
        let mut rows: Vec<&TagRow> = self
            .links
            .get(task)
            .map(|ids| ids.iter().filter_map(|id| self.tags.get(id)).collect())
            .unwrap_or_default();
        rows.sort_by_key(|row| row.seq);
        rows
    }
}

impl WriteSession for Tables {
    fn insert_task(&mut self, row: TaskRow) -> Result<(), StoreError> {
        if self.tasks.contains_key(&row.id) {
            return Err(StoreError::DuplicateTask(row.id));
        }
        self.tasks.insert(row.id, row);
        Ok(())
    }

    fn update_task(&mut self, row: TaskRow) -> Result<(), StoreError> {
        match self.tasks.get_mut(&row.id) {
            Some(existing) if existing.owner_id == row.owner_id => {
                *existing = row;
                Ok(())
            }
            _ => Err(StoreError::MissingTask(row.id)),
        }
    }

    fn delete_task(&mut self, owner: &OwnerId, id: &TaskId) -> Result<TaskRow, StoreError> {
        if self.task(owner, id).is_none() {
            return Err(StoreError::MissingTask(*id));
        }
        self.links.remove(id);
        self.tasks.remove(id).ok_or(StoreError::MissingTask(*id))
    }

    fn insert_tag(&mut self, tag: NewTag) -> Result<TagRow, StoreError> {
        let key = name_key(&tag.owner_id, &tag.name);
        if let Some(existing) = self.tag_names.get(&key) {
            return Err(StoreError::UniqueViolation {
                existing: *existing,
            });
        }
        self.next_seq += 1;
        let row = TagRow {
            id: TagId::new(),
            owner_id: tag.owner_id,
            name: tag.name,
            color: tag.color,
            seq: self.next_seq,
        };
        self.tag_names.insert(key, row.id);
        self.tags.insert(row.id, row.clone());
        Ok(row)
    }

    fn set_task_tags(&mut self, task: &TaskId, tags: &[TagId]) -> Result<(), StoreError> {
        if !self.tasks.contains_key(task) {
            return Err(StoreError::MissingTask(*task));
        }
        let mut linked: Vec<TagId> = Vec::with_capacity(tags.len());
        for id in tags {
            if !self.tags.contains_key(id) {
                return Err(StoreError::MissingTag(*id));
            }
            if !linked.contains(id) {
                linked.push(*id);
            }
        }
        self.links.insert(*task, linked);
        Ok(())
    }
}

/// Shared storage for all owners.
#[derive(Debug, Default)]
pub struct Store {
    tables: RwLock<Tables>,
    fail_commits: AtomicBool,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a read-only view. Writers wait until it is dropped.
    pub async fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            guard: self.tables.read().await,
        }
    }

    /// Opens a transaction holding the write lock until commit or drop.
    pub async fn begin(&self) -> Transaction<'_> {
        let guard = self.tables.write().await;
        let staged = guard.clone();
        Transaction {
            guard,
            staged,
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }
    }

    /// Makes every subsequent commit fail with [`StoreError::Unavailable`]
    /// until switched off. Used to exercise rollback paths.
    pub fn set_commit_failure(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

/// A read-only view of the tables.
#[derive(Debug)]
pub struct Snapshot<'a> {
    guard: RwLockReadGuard<'a, Tables>,
}

impl Deref for Snapshot<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &self.guard
    }
}

/// A write transaction. Changes are staged and only become visible on
/// [`commit`](Self::commit).
#[derive(Debug)]
pub struct Transaction<'a> {
    guard: RwLockWriteGuard<'a, Tables>,
    staged: Tables,
    fail_commit: bool,
}

impl Transaction<'_> {
    /// Publishes every staged change.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the store rejects the commit; nothing
    /// is published in that case.
    pub fn commit(self) -> Result<(), StoreError> {
        if self.fail_commit {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }
        let Self {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }
}

impl Deref for Transaction<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &self.staged
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Tables {
        &mut self.staged
    }
}
