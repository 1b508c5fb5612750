//! Query parameters for `GET /tasks`.
//!
//! The server parses raw query pairs into these types; the client builds
//! them and renders them back into pairs with [`ListQuery::to_pairs`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::task::Priority;

/// Page size used when `limit` is not given.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Hard upper bound on `limit`.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Completion filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// No constraint.
    #[default]
    All,
    /// Only tasks with `completed = false`.
    Active,
    /// Only tasks with `completed = true`.
    Completed,
}

impl StatusFilter {
    /// Returns the wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Returns `true` if a task with the given completion state passes.
    #[must_use]
    pub const fn admits(self, completed: bool) -> bool {
        match self {
            Self::All => true,
            Self::Active => !completed,
            Self::Completed => completed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Sort key. Exactly one is active per query; ties always break on `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Newest first.
    #[default]
    CreatedDesc,
    /// Oldest first.
    CreatedAsc,
    /// High, then medium, then low.
    PriorityDesc,
    /// Earliest due date first; tasks without a due date last.
    DueAsc,
    /// Case-insensitive title order.
    TitleAsc,
}

impl SortKey {
    /// Every sort key.
    pub const ALL: [Self; 5] = [
        Self::CreatedDesc,
        Self::CreatedAsc,
        Self::PriorityDesc,
        Self::DueAsc,
        Self::TitleAsc,
    ];

    /// Returns the canonical wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedDesc => "created_desc",
            Self::CreatedAsc => "created_asc",
            Self::PriorityDesc => "priority_desc",
            Self::DueAsc => "due_asc",
            Self::TitleAsc => "title_asc",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    /// Accepts both `created_desc` and `createdDesc` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_desc" | "createdDesc" => Ok(Self::CreatedDesc),
            "created_asc" | "createdAsc" => Ok(Self::CreatedAsc),
            "priority_desc" | "priorityDesc" => Ok(Self::PriorityDesc),
            "due_asc" | "dueAsc" => Ok(Self::DueAsc),
            "title_asc" | "titleAsc" => Ok(Self::TitleAsc),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

/// A filter/sort/pagination request for the task list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Completion filter.
    pub status: StatusFilter,
    /// Exact priority match, if any.
    pub priority: Option<Priority>,
    /// Tag names; a task matches if it carries at least one.
    pub tags: Vec<String>,
    /// Sort key.
    pub sort: SortKey,
    /// Page size; `None` means [`DEFAULT_PAGE_SIZE`].
    pub limit: Option<usize>,
    /// Number of matching tasks to skip.
    pub offset: Option<usize>,
}

impl ListQuery {
    /// Renders the query as `(key, value)` pairs, omitting defaults.
    ///
    /// Tags are rendered as repeated `tag` pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if self.status != StatusFilter::All {
            pairs.push(("status".to_string(), self.status.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority".to_string(), priority.as_str().to_string()));
        }
        for tag in &self.tags {
            pairs.push(("tag".to_string(), tag.clone()));
        }
        if self.sort != SortKey::CreatedDesc {
            pairs.push(("sort".to_string(), self.sort.as_str().to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        pairs
    }
}
