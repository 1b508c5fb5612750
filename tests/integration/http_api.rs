//! End-to-end tests for the task HTTP API.
//!
//! Each test starts a server on an OS-assigned port and talks to it over
//! real HTTP.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::too_many_lines)]

use std::sync::Arc;

use serde_json::{Value, json};
use taskboard_proto::api::{DeleteTaskResponse, ErrorBody, TaskListResponse};
use taskboard_proto::task::{Tag, Task};
use taskboard_server::http::{self, AppState};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct TestServer {
    base: String,
    client: reqwest::Client,
    state: Arc<AppState>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start() -> TestServer {
    let state = Arc::new(AppState::default());
    let (addr, handle) = http::start_server_with_state("127.0.0.1:0", state.clone())
        .await
        .expect("failed to start server");
    TestServer {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        state,
        handle,
    }
}

impl TestServer {
    async fn create(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/tasks", self.base))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn create_ok(&self, body: Value) -> Task {
        let resp = self.create(body).await;
        assert_eq!(resp.status(), 201);
        resp.json().await.unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .unwrap()
    }

    async fn list(&self, query: &str) -> TaskListResponse {
        let resp = self.get(&format!("/tasks{query}")).await;
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    async fn patch(&self, id: impl std::fmt::Display, body: Value) -> reqwest::Response {
        self.client
            .patch(format!("{}/tasks/{id}", self.base))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, id: impl std::fmt::Display) -> reqwest::Response {
        self.client
            .delete(format!("{}/tasks/{id}", self.base))
            .send()
            .await
            .unwrap()
    }
}

fn titles(list: &TaskListResponse) -> Vec<&str> {
    list.tasks.iter().map(|t| t.title.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Create and tag resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_with_new_tags_then_reuse_case_insensitively() {
    let server = start().await;

    let first = server
        .create_ok(json!({
            "title": "Buy milk",
            "priority": "high",
            "tags": ["errand", "personal"]
        }))
        .await;
    assert_eq!(first.title, "Buy milk");
    assert_eq!(first.tags.len(), 2);
    assert_eq!(first.tags[0].name, "errand");
    assert_eq!(first.tags[1].name, "personal");

    let second = server
        .create_ok(json!({"title": "Buy bread", "tags": ["Errand"]}))
        .await;
    assert_eq!(second.tags.len(), 1);
    assert_eq!(second.tags[0].id, first.tags[0].id);
    assert_eq!(second.tags[0].name, "errand");

    let tags: Vec<Tag> = server.get("/tags").await.json().await.unwrap();
    assert_eq!(tags.len(), 2);
}

#[tokio::test]
async fn created_task_has_equal_timestamps_and_defaults() {
    let server = start().await;
    let task = server.create_ok(json!({"title": "  Call mom  "})).await;

    let fetched: Task = server
        .get(&format!("/tasks/{}", task.id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fetched.title, "Call mom");
    assert_eq!(fetched.created_at, fetched.updated_at);
    assert!(!fetched.completed);
    assert_eq!(fetched.priority.as_str(), "medium");
    assert_eq!(fetched.owner_id.as_str(), "default");

    let raw: Value = server
        .get(&format!("/tasks/{}", task.id))
        .await
        .json()
        .await
        .unwrap();
    assert!(raw.get("createdAt").is_some());
    assert!(raw.get("dueDate").is_some());
}

#[tokio::test]
async fn invalid_create_is_rejected_without_side_effects() {
    let server = start().await;

    let resp = server
        .create(json!({"title": "   ", "tags": ["brand-new"]}))
        .await;
    assert_eq!(resp.status(), 422);
    let body: ErrorBody = resp.json().await.unwrap();
    assert_eq!(body.error.code, "VALIDATION_ERROR");
    let details = body.error.details.unwrap();
    assert!(details.iter().any(|d| d.field == "title"));

    let long_title = "x".repeat(201);
    assert_eq!(server.create(json!({"title": long_title})).await.status(), 422);
    let long_tag = "t".repeat(51);
    assert_eq!(
        server
            .create(json!({"title": "ok", "tags": ["fine", long_tag]}))
            .await
            .status(),
        422
    );
    assert_eq!(
        server
            .create(json!({"title": "ok", "priority": "urgent"}))
            .await
            .status(),
        422
    );

    assert_eq!(server.list("").await.total, 0);
    let tags: Vec<Tag> = server.get("/tags").await.json().await.unwrap();
    assert!(tags.is_empty());
}

#[tokio::test]
async fn failed_commit_leaves_nothing_behind() {
    let server = start().await;
    server.state.service().store().set_commit_failure(true);

    let resp = server
        .create(json!({"title": "doomed", "tags": ["orphan"]}))
        .await;
    assert_eq!(resp.status(), 500);
    let body: ErrorBody = resp.json().await.unwrap();
    assert_eq!(body.error.code, "INTERNAL_ERROR");

    server.state.service().store().set_commit_failure(false);
    assert_eq!(server.list("").await.total, 0);
    let tags: Vec<Tag> = server.get("/tags").await.json().await.unwrap();
    assert!(tags.is_empty());
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn patch_completed_advances_updated_at() {
    let server = start().await;
    let task = server.create_ok(json!({"title": "Write report"})).await;

    let resp = server.patch(task.id, json!({"completed": true})).await;
    assert_eq!(resp.status(), 200);

    let fetched: Task = server
        .get(&format!("/tasks/{}", task.id))
        .await
        .json()
        .await
        .unwrap();
    assert!(fetched.completed);
    assert!(fetched.updated_at > fetched.created_at);
    assert_eq!(fetched.created_at, task.created_at);
    assert_eq!(fetched.title, "Write report");
}

#[tokio::test]
async fn patch_due_date_null_clears_and_absent_keeps() {
    let server = start().await;
    let task = server
        .create_ok(json!({"title": "Pay rent", "dueDate": "2026-05-01T00:00:00Z"}))
        .await;
    assert!(task.due_date.is_some());

    let kept: Task = server
        .patch(task.id, json!({"priority": "low"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(kept.due_date, task.due_date);

    let cleared: Task = server
        .patch(task.id, json!({"dueDate": null}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(cleared.due_date, None);
    assert!(cleared.updated_at > kept.updated_at);
}

#[tokio::test]
async fn patch_tags_replaces_links() {
    let server = start().await;
    let task = server
        .create_ok(json!({"title": "Plan trip", "tags": ["travel", "family"]}))
        .await;

    let updated: Task = server
        .patch(task.id, json!({"tags": ["Family", "budget"]}))
        .await
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = updated.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["family", "budget"]);
    assert_eq!(updated.tags[0].id, task.tags[1].id);

    let untagged: Task = server
        .patch(task.id, json!({"tags": []}))
        .await
        .json()
        .await
        .unwrap();
    assert!(untagged.tags.is_empty());

    let tags: Vec<Tag> = server.get("/tags").await.json().await.unwrap();
    assert_eq!(tags.len(), 3);
}

#[tokio::test]
async fn patch_rejects_empty_and_invalid_bodies() {
    let server = start().await;
    let task = server.create_ok(json!({"title": "a"})).await;

    assert_eq!(server.patch(task.id, json!({})).await.status(), 422);
    assert_eq!(
        server.patch(task.id, json!({"title": ""})).await.status(),
        422
    );
    assert_eq!(
        server
            .patch(task.id, json!({"description": "d".repeat(1001)}))
            .await
            .status(),
        422
    );

    let resp = server
        .client
        .patch(format!("{}/tasks/{}", server.base, task.id))
        .header("content-type", "application/json")
        .body("{\"completed\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn missing_tasks_are_not_found() {
    let server = start().await;
    let ghost = taskboard_proto::task::TaskId::new();

    assert_eq!(server.get(&format!("/tasks/{ghost}")).await.status(), 404);
    assert_eq!(
        server.patch(ghost, json!({"completed": true})).await.status(),
        404
    );
    let resp = server.delete(ghost).await;
    assert_eq!(resp.status(), 404);
    let body: ErrorBody = resp.json().await.unwrap();
    assert_eq!(body.error.code, "NOT_FOUND");

    assert_eq!(server.get("/tasks/12345").await.status(), 404);
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_removes_task_but_keeps_tags() {
    let server = start().await;
    let keep = server.create_ok(json!({"title": "keep"})).await;
    let gone = server
        .create_ok(json!({"title": "gone", "tags": ["misc"]}))
        .await;

    let resp = server.delete(gone.id).await;
    assert_eq!(resp.status(), 200);
    let body: DeleteTaskResponse = resp.json().await.unwrap();
    assert!(body.deleted);
    assert_eq!(body.id, gone.id);

    assert_eq!(server.get(&format!("/tasks/{}", gone.id)).await.status(), 404);
    let list = server.list("").await;
    assert_eq!(list.total, 1);
    assert_eq!(list.tasks[0].id, keep.id);

    let tags: Vec<Tag> = server.get("/tags").await.json().await.unwrap();
    assert_eq!(tags[0].name, "misc");
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

async fn seed(server: &TestServer) {
    for body in [
        json!({"title": "low later", "priority": "low", "dueDate": "2026-06-10T00:00:00Z", "tags": ["home"]}),
        json!({"title": "high undated", "priority": "high", "tags": ["Work"]}),
        json!({"title": "medium soon", "priority": "medium", "dueDate": "2026-06-01T00:00:00Z"}),
        json!({"title": "high soon", "priority": "high", "dueDate": "2026-06-02T00:00:00Z", "tags": ["work", "home"]}),
        json!({"title": "low undated", "priority": "low"}),
    ] {
        server.create_ok(body).await;
    }
}

#[tokio::test]
async fn status_filters_partition_the_list() {
    let server = start().await;
    seed(&server).await;
    let all = server.list("").await;
    server
        .patch(all.tasks[0].id, json!({"completed": true}))
        .await;
    server
        .patch(all.tasks[3].id, json!({"completed": true}))
        .await;

    let active = server.list("?status=active").await;
    let completed = server.list("?status=completed").await;
    let all = server.list("?status=all").await;
    assert_eq!(active.total, 3);
    assert_eq!(completed.total, 2);
    assert_eq!(active.total + completed.total, all.total);
    assert!(active.tasks.iter().all(|t| !t.completed));
    assert!(completed.tasks.iter().all(|t| t.completed));
    for task in &active.tasks {
        assert!(completed.tasks.iter().all(|c| c.id != task.id));
    }
}

#[tokio::test]
async fn sorting_by_priority_and_due_date() {
    let server = start().await;
    seed(&server).await;

    let by_priority = server.list("?sort=priority_desc").await;
    let ranks: Vec<u8> = by_priority.tasks.iter().map(|t| t.priority.rank()).collect();
    assert!(ranks.windows(2).all(|w| w[0] >= w[1]));

    let by_due = server.list("?sort=dueAsc").await;
    assert_eq!(
        titles(&by_due)[..3],
        ["medium soon", "high soon", "low later"]
    );
    assert!(by_due.tasks[3..].iter().all(|t| t.due_date.is_none()));

    let by_title = server.list("?sort=title_asc").await;
    assert_eq!(titles(&by_title)[0], "high soon");

    let newest = server.list("").await;
    assert_eq!(titles(&newest)[0], "low undated");
}

#[tokio::test]
async fn tag_filters_match_any_case_insensitively() {
    let server = start().await;
    seed(&server).await;

    let work = server.list("?tag=WORK&sort=created_asc").await;
    assert_eq!(titles(&work), vec!["high undated", "high soon"]);

    let either = server.list("?tags=home,work").await;
    assert_eq!(either.total, 3);

    let repeated = server.list("?tag=home&tag=work&priority=high").await;
    assert_eq!(repeated.total, 2);

    let none = server.list("?tag=nothing").await;
    assert_eq!(none.total, 0);
}

#[tokio::test]
async fn pagination_reports_total_before_paging() {
    let server = start().await;
    seed(&server).await;

    let page = server.list("?sort=created_asc&limit=2&offset=2").await;
    assert_eq!(page.total, 5);
    assert_eq!(page.limit, 2);
    assert_eq!(page.offset, 2);
    assert_eq!(titles(&page), vec!["medium soon", "high soon"]);

    let defaults = server.list("").await;
    assert_eq!(defaults.limit, 100);
    assert_eq!(defaults.offset, 0);
}

#[tokio::test]
async fn bad_list_parameters_are_rejected() {
    let server = start().await;
    for query in [
        "?limit=0",
        "?limit=1001",
        "?limit=ten",
        "?offset=-3",
        "?sort=bogus",
        "?status=done",
        "?priority=urgent",
    ] {
        let resp = server.get(&format!("/tasks{query}")).await;
        assert_eq!(resp.status(), 422, "expected 422 for {query}");
        let body: ErrorBody = resp.json().await.unwrap();
        assert_eq!(body.error.code, "VALIDATION_ERROR");
    }
}

// ---------------------------------------------------------------------------
// Tags endpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn post_tags_creates_or_reuses() {
    let server = start().await;

    let resp = server
        .client
        .post(format!("{}/api/v1/tags", server.base))
        .json(&json!({"name": "Urgent"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Tag = resp.json().await.unwrap();
    assert!(created.color.is_some());

    let resp = server
        .client
        .post(format!("{}/api/v1/tags", server.base))
        .json(&json!({"name": "urgent", "color": "#000000"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let reused: Tag = resp.json().await.unwrap();
    assert_eq!(reused.id, created.id);
    assert_eq!(reused.name, "Urgent");

    let resp = server
        .client
        .post(format!("{}/tags", server.base))
        .json(&json!({"name": "bad", "color": "blue"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
}
