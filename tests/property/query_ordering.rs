//! Property-based tests for task list filtering, ordering and paging.
//!
//! Uses proptest to verify, over arbitrary task sets:
//! 1. `status=active` and `status=completed` partition `status=all`.
//! 2. `priority_desc` never places a lower priority before a higher one.
//! 3. `due_asc` places every undated task after every dated one.
//! 4. Every sort is a total order: equal keys fall back to ascending id.
//! 5. Walking the pages reproduces the unpaged list, and `total` ignores paging.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use taskboard_proto::query::{SortKey, StatusFilter};
use taskboard_proto::task::{OwnerId, Priority, Task, TaskId};
use taskboard_server::query::{TaskQuery, compare};
use taskboard_server::store::{NewTag, ReadSession, Tables, TaskRow, WriteSession};
use uuid::Uuid;

const TAG_NAMES: [&str; 4] = ["work", "Home", "errand", "later"];

#[derive(Debug, Clone)]
struct Seed {
    id: u128,
    completed: bool,
    priority: Priority,
    created_minute: i64,
    due_day: Option<i64>,
    title: String,
    tags: Vec<usize>,
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop::sample::select(Priority::ALL.to_vec())
}

fn arb_sort() -> impl Strategy<Value = SortKey> {
    prop::sample::select(SortKey::ALL.to_vec())
}

/// Small value ranges so equal sort keys are common.
fn arb_seed() -> impl Strategy<Value = Seed> {
    (
        any::<u128>(),
        any::<bool>(),
        arb_priority(),
        0_i64..5,
        prop::option::of(0_i64..4),
        "[a-cA-C]{1,3}",
        prop::collection::vec(0..TAG_NAMES.len(), 0..3),
    )
        .prop_map(
            |(id, completed, priority, created_minute, due_day, title, tags)| Seed {
                id,
                completed,
                priority,
                created_minute,
                due_day,
                title,
                tags,
            },
        )
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn build(seeds: &[Seed]) -> Tables {
    let owner = OwnerId::default();
    let mut tables = Tables::default();
    let mut seen = HashSet::new();
    for seed in seeds {
        if !seen.insert(seed.id) {
            continue;
        }
        let created = base() + Duration::minutes(seed.created_minute);
        let id = TaskId::from_uuid(Uuid::from_u128(seed.id));
        tables
            .insert_task(TaskRow {
                id,
                owner_id: owner.clone(),
                title: seed.title.clone(),
                description: String::new(),
                completed: seed.completed,
                priority: seed.priority,
                due_date: seed.due_day.map(|d| base() + Duration::days(d)),
                created_at: created,
                updated_at: created,
            })
            .unwrap();

        let mut tag_ids = Vec::new();
        for &i in &seed.tags {
            let name = TAG_NAMES[i];
            let tag = match tables.tag_by_name(&owner, name) {
                Some(existing) => existing.id,
                None => {
                    tables
                        .insert_tag(NewTag {
                            owner_id: owner.clone(),
                            name: name.to_string(),
                            color: None,
                        })
                        .unwrap()
                        .id
                }
            };
            tag_ids.push(tag);
        }
        tables.set_task_tags(&id, &tag_ids).unwrap();
    }
    tables
}

fn everything(sort: SortKey) -> TaskQuery {
    TaskQuery {
        sort,
        limit: 1000,
        ..TaskQuery::default()
    }
}

fn ids(tasks: &[Task]) -> Vec<TaskId> {
    tasks.iter().map(|t| t.id).collect()
}

proptest! {
    #[test]
    fn status_filters_partition_all(seeds in prop::collection::vec(arb_seed(), 0..30)) {
        let tables = build(&seeds);
        let owner = OwnerId::default();
        let run = |status: StatusFilter| {
            let query = TaskQuery { status, ..everything(SortKey::CreatedDesc) };
            query.execute(&tables, &owner)
        };

        let (all, all_total) = run(StatusFilter::All);
        let (active, active_total) = run(StatusFilter::Active);
        let (completed, completed_total) = run(StatusFilter::Completed);

        prop_assert_eq!(active_total + completed_total, all_total);
        let active_ids: HashSet<TaskId> = ids(&active).into_iter().collect();
        let completed_ids: HashSet<TaskId> = ids(&completed).into_iter().collect();
        prop_assert!(active_ids.is_disjoint(&completed_ids));
        let union: HashSet<TaskId> = active_ids.union(&completed_ids).copied().collect();
        let all_ids: HashSet<TaskId> = ids(&all).into_iter().collect();
        prop_assert_eq!(union, all_ids);
    }

    #[test]
    fn priority_desc_orders_high_medium_low(seeds in prop::collection::vec(arb_seed(), 0..30)) {
        let tables = build(&seeds);
        let (tasks, _) = everything(SortKey::PriorityDesc).execute(&tables, &OwnerId::default());
        for pair in tasks.windows(2) {
            prop_assert!(pair[0].priority.rank() >= pair[1].priority.rank());
        }
    }

    #[test]
    fn due_asc_puts_undated_last(seeds in prop::collection::vec(arb_seed(), 0..30)) {
        let tables = build(&seeds);
        let (tasks, _) = everything(SortKey::DueAsc).execute(&tables, &OwnerId::default());
        let first_undated = tasks.iter().position(|t| t.due_date.is_none()).unwrap_or(tasks.len());
        prop_assert!(tasks[first_undated..].iter().all(|t| t.due_date.is_none()));
        for pair in tasks[..first_undated].windows(2) {
            prop_assert!(pair[0].due_date <= pair[1].due_date);
        }
    }

    #[test]
    fn every_sort_is_a_total_order(
        seeds in prop::collection::vec(arb_seed(), 0..30),
        sort in arb_sort(),
    ) {
        let tables = build(&seeds);
        let (tasks, _) = everything(sort).execute(&tables, &OwnerId::default());
        for pair in tasks.windows(2) {
            prop_assert_eq!(compare(sort, &pair[0], &pair[1]), std::cmp::Ordering::Less);
        }
    }

    #[test]
    fn pages_concatenate_to_full_list(
        seeds in prop::collection::vec(arb_seed(), 0..30),
        sort in arb_sort(),
        limit in 1_usize..7,
        tag in prop::option::of(0..TAG_NAMES.len()),
    ) {
        let tables = build(&seeds);
        let owner = OwnerId::default();
        let tags: Vec<String> = tag.map(|i| TAG_NAMES[i].to_lowercase()).into_iter().collect();
        let full_query = TaskQuery { tags: tags.clone(), ..everything(sort) };
        let (full, total) = full_query.execute(&tables, &owner);
        prop_assert_eq!(full.len(), total);

        let mut walked = Vec::new();
        let mut offset = 0;
        loop {
            let page_query = TaskQuery { tags: tags.clone(), limit, offset, ..everything(sort) };
            let (page, page_total) = page_query.execute(&tables, &owner);
            prop_assert_eq!(page_total, total);
            prop_assert!(page.len() <= limit);
            if page.is_empty() {
                break;
            }
            offset += page.len();
            walked.extend(page);
        }
        prop_assert_eq!(ids(&walked), ids(&full));

        if let Some(name) = tags.first() {
            prop_assert!(full.iter().all(|t| t.has_tag(name)));
            let tagged = tables
                .tasks(&owner)
                .into_iter()
                .filter(|row| tables.hydrate(row).has_tag(name))
                .count();
            prop_assert_eq!(tagged, total);
        }
    }
}
