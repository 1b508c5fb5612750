//! Tag resolution: turn tag names into tag records, reusing what exists.
//!
//! Names are compared on their trimmed lowercase form and stored with the
//! casing they were first written in. Resolution runs inside the caller's
//! transaction, so tags created for a task that then fails to persist are
//! discarded with it.

use std::collections::HashSet;

use rand::seq::IndexedRandom;
use taskboard_proto::api::{CreateTagRequest, validate_tag_names};
use taskboard_proto::task::{OwnerId, Tag};

use crate::service::ServiceError;
use crate::store::{NewTag, ReadSession, StoreError, WriteSession};

/// Colors handed out to tags created through `POST /tags` without one.
pub const TAG_PALETTE: [&str; 6] = [
    "#3B82F6", "#EF4444", "#F59E0B", "#10B981", "#8B5CF6", "#EC4899",
];

/// Resolves `names` to tags of `owner`, creating the missing ones.
///
/// Duplicates (after trimming, case-insensitively) collapse into one tag.
/// The result follows the first occurrence of each name.
///
/// # Errors
///
/// [`ServiceError::Validation`] if any name is empty or too long; nothing is
/// looked up or inserted in that case. [`ServiceError::Unexpected`] on
/// storage failure.
pub fn resolve<S>(session: &mut S, names: &[String], owner: &OwnerId) -> Result<Vec<Tag>, ServiceError>
where
    S: WriteSession + ?Sized,
{
    let names = validate_tag_names(names)?;
    let mut seen = HashSet::with_capacity(names.len());
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.to_lowercase()) {
            continue;
        }
        let (tag, _) = find_or_insert(session, name, None, owner)?;
        resolved.push(tag);
    }
    Ok(resolved)
}

/// Creates a tag directly, or returns the existing one with the same name.
///
/// The boolean is `true` when a new tag was inserted. A new tag without a
/// requested color gets one from [`TAG_PALETTE`].
///
/// # Errors
///
/// [`ServiceError::Validation`] for a bad name or color.
pub fn create_tag<S>(
    session: &mut S,
    request: &CreateTagRequest,
    owner: &OwnerId,
) -> Result<(Tag, bool), ServiceError>
where
    S: WriteSession + ?Sized,
{
    request.validate()?;
    let color = request
        .color
        .clone()
        .or_else(|| TAG_PALETTE.choose(&mut rand::rng()).map(|c| (*c).to_string()));
    Ok(find_or_insert(
        session,
        request.name.trim().to_string(),
        color,
        owner,
    )?)
}

/// Lists every tag of `owner`, ordered by lowercase name.
pub fn list_tags<S>(session: &S, owner: &OwnerId) -> Vec<Tag>
where
    S: ReadSession + ?Sized,
{
    let mut rows = session.tags(owner);
    rows.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    rows.into_iter().map(|row| row.to_tag()).collect()
}

fn find_or_insert<S>(
    session: &mut S,
    name: String,
    color: Option<String>,
    owner: &OwnerId,
) -> Result<(Tag, bool), StoreError>
where
    S: WriteSession + ?Sized,
{
    if let Some(existing) = session.tag_by_name(owner, &name) {
        return Ok((existing.to_tag(), false));
    }
    let insert = NewTag {
        owner_id: owner.clone(),
        name,
        color,
    };
    match session.insert_tag(insert) {
        Ok(row) => {
            tracing::debug!(owner = %owner, tag_id = %row.id, name = %row.name, "created tag");
            Ok((row.to_tag(), true))
        }
        // Someone else took the name between lookup and insert.
        Err(StoreError::UniqueViolation { existing }) => session
            .tag(&existing)
            .map(|row| (row.to_tag(), false))
            .ok_or(StoreError::MissingTag(existing)),
        Err(e) => Err(e),
    }
}
