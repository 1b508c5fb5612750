//! Filtering, sorting and pagination for the task list.
//!
//! A [`TaskQuery`] is built from raw query-string pairs (or a typed
//! [`ListQuery`]) and runs against any [`ReadSession`].

use std::cmp::Ordering;
use std::str::FromStr;

use taskboard_proto::api::{FieldError, ValidationError};
use taskboard_proto::query::{DEFAULT_PAGE_SIZE, ListQuery, MAX_PAGE_SIZE, SortKey, StatusFilter};
use taskboard_proto::task::{OwnerId, Priority, Task};

use crate::store::ReadSession;

/// A validated list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    /// Completion filter.
    pub status: StatusFilter,
    /// Exact priority match.
    pub priority: Option<Priority>,
    /// Lowercased tag names; a task matches if it carries any of them.
    pub tags: Vec<String>,
    /// Sort key.
    pub sort: SortKey,
    /// Page size, at least 1.
    pub limit: usize,
    /// Matching tasks to skip.
    pub offset: usize,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            status: StatusFilter::All,
            priority: None,
            tags: Vec::new(),
            sort: SortKey::CreatedDesc,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

fn parse_param<T>(field: &str, raw: &str) -> Result<T, FieldError>
where
    T: FromStr,
{
    raw.parse()
        .map_err(|_| FieldError::new(field, format!("invalid value: {raw}")))
}

fn push_tag(tags: &mut Vec<String>, raw: &str) {
    let name = raw.trim().to_lowercase();
    if !name.is_empty() && !tags.contains(&name) {
        tags.push(name);
    }
}

impl TaskQuery {
    /// Parses raw query pairs.
    ///
    /// `tag` may repeat and names one tag per value, commas included.
    /// `tags` takes a comma-separated list. Both feed the same filter. Unknown keys are ignored. `max_limit` is the
    /// configured page cap and is itself capped at [`MAX_PAGE_SIZE`].
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] naming every offending parameter.
    pub fn from_params(pairs: &[(String, String)], max_limit: usize) -> Result<Self, ValidationError> {
        let max_limit = max_limit.clamp(1, MAX_PAGE_SIZE);
        let mut query = Self {
            limit: DEFAULT_PAGE_SIZE.min(max_limit),
            ..Self::default()
        };
        let mut errors = Vec::new();

        for (key, value) in pairs {
            let parsed = match key.as_str() {
                "status" => parse_param(key, value).map(|s| query.status = s),
                "priority" => parse_param(key, value).map(|p| query.priority = Some(p)),
                "tag" => {
                    push_tag(&mut query.tags, value);
                    Ok(())
                }
                "tags" => {
                    for name in value.split(',') {
                        push_tag(&mut query.tags, name);
                    }
                    Ok(())
                }
                "sort" => parse_param(key, value).map(|s| query.sort = s),
                "limit" => parse_param::<usize>(key, value)
                    .and_then(|limit| check_limit(limit, max_limit))
                    .map(|limit| query.limit = limit),
                "offset" => parse_param(key, value).map(|o| query.offset = o),
                _ => Ok(()),
            };
            if let Err(e) = parsed {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(query)
        } else {
            Err(ValidationError::new(errors))
        }
    }

    /// Converts a typed client query, applying the same limits as
    /// [`from_params`](Self::from_params).
    ///
    /// # Errors
    ///
    /// A [`ValidationError`] on `limit` when it is zero or above the cap.
    pub fn from_list_query(list: &ListQuery, max_limit: usize) -> Result<Self, ValidationError> {
        let max_limit = max_limit.clamp(1, MAX_PAGE_SIZE);
        let limit = match list.limit {
            Some(limit) => check_limit(limit, max_limit)?,
            None => DEFAULT_PAGE_SIZE.min(max_limit),
        };
        let mut tags = Vec::new();
        for tag in &list.tags {
            push_tag(&mut tags, tag);
        }
        Ok(Self {
            status: list.status,
            priority: list.priority,
            tags,
            sort: list.sort,
            limit,
            offset: list.offset.unwrap_or(0),
        })
    }

    /// Returns `true` if `task` passes every filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.status.admits(task.completed)
            && self.priority.is_none_or(|p| task.priority == p)
            && (self.tags.is_empty()
                || task
                    .tags
                    .iter()
                    .any(|t| self.tags.contains(&t.name.to_lowercase())))
    }

    /// Runs the query for `owner`, returning one page and the number of
    /// matching tasks before pagination.
    pub fn execute<S>(&self, session: &S, owner: &OwnerId) -> (Vec<Task>, usize)
    where
        S: ReadSession + ?Sized,
    {
        let mut matching: Vec<Task> = session
            .tasks(owner)
            .into_iter()
            .map(|row| session.hydrate(row))
            .filter(|task| self.matches(task))
            .collect();
        matching.sort_by(|a, b| compare(self.sort, a, b));

        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect();
        (page, total)
    }
}

fn check_limit(limit: usize, max_limit: usize) -> Result<usize, FieldError> {
    if limit == 0 {
        Err(FieldError::new("limit", "must be at least 1"))
    } else if limit > max_limit {
        Err(FieldError::new(
            "limit",
            format!("must be at most {max_limit}"),
        ))
    } else {
        Ok(limit)
    }
}

/// Orders two tasks under `sort`, breaking ties on id.
#[must_use]
pub fn compare(sort: SortKey, a: &Task, b: &Task) -> Ordering {
    let primary = match sort {
        SortKey::CreatedDesc => b.created_at.cmp(&a.created_at),
        SortKey::CreatedAsc => a.created_at.cmp(&b.created_at),
        SortKey::PriorityDesc => b.priority.rank().cmp(&a.priority.rank()),
        SortKey::DueAsc => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::TitleAsc => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}
