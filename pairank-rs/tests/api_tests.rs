//! Integration tests for pairank-rs API endpoints
//!
//! Tests cover:
//! - Task retrieval and completion page
//! - Vote submission, redirect and duplicate rejection
//! - Results and status reporting
//! - Input validation errors
//! - Health endpoint

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use pairank_common::{ExperimentDefinition, JsonFileStore, Ledger, MemoryStore, TaskSet};
use pairank_rs::{build_router, AppState};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

const EXPERIMENT: &str = r#"{
    "weights": ["w1", "w2", "w3"],
    "inputs": [{"id": "dp1", "input": {"text": "A scenic view of a mountain", "image": "/static/input1.jpg"}}],
    "outputs": {
        "w1": ["/static/dp1_w1.jpg"],
        "w2": ["/static/dp1_w2.jpg"],
        "w3": ["/static/dp1_w3.jpg"]
    }
}"#;

/// Test helper: Create app backed by a snapshot file in `dir`
fn setup_app(dir: &Path) -> Router {
    let definition = ExperimentDefinition::from_json_str(EXPERIMENT).unwrap();
    let tasks = Arc::new(TaskSet::build(&definition).unwrap());
    let store = Arc::new(JsonFileStore::new(dir.join("progress_store.json")));
    let ledger = Ledger::open(tasks, &definition.weights, store).unwrap();
    build_router(AppState::new(Arc::new(ledger)), None)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_form(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Body should be UTF-8")
}

async fn body_json(body: Body) -> Value {
    serde_json::from_str(&body_text(body).await).expect("Should parse JSON")
}

/// Pull a hidden form field value out of the task page
fn hidden_field(html: &str, name: &str) -> String {
    let marker = format!("name=\"{}\" value=\"", name);
    let start = html.find(&marker).expect("field present") + marker.len();
    let end = html[start..].find('"').expect("field terminated");
    html[start..start + end].to_string()
}

/// Fetch the current task and submit a vote for it
async fn answer_current_task(app: &Router, rater: &str, left: &str, right: &str) -> axum::response::Response {
    let response = app
        .clone()
        .oneshot(get(&format!("/task?rater_id={}", rater)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response.into_body()).await;

    let form = format!(
        "rater_id={}&datapoint_id={}&left_weight={}&right_weight={}&left_selected={}&right_selected={}",
        rater,
        hidden_field(&html, "datapoint_id"),
        hidden_field(&html, "left_weight"),
        hidden_field(&html, "right_weight"),
        left,
        right
    );
    app.clone().oneshot(post_form("/submit", form)).await.unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "pairank-rs");
    assert_eq!(body["total_tasks"], 3);
}

// =============================================================================
// Task flow
// =============================================================================

#[tokio::test]
async fn test_task_page_is_stable_until_submission() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let first = body_text(app.clone().oneshot(get("/task?rater_id=r1")).await.unwrap().into_body()).await;
    let second = body_text(app.clone().oneshot(get("/task?rater_id=r1")).await.unwrap().into_body()).await;

    assert!(first.contains("Select your favorite!"));
    assert!(first.contains("A scenic view of a mountain"));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_full_rating_session() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    // First two submissions redirect back to the next task
    for _ in 0..2 {
        let response = answer_current_task(&app, "r1", "0", "1").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/task?rater_id=r1");
    }

    // Last one shows the completion page
    let response = answer_current_task(&app, "r1", "0", "1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response.into_body()).await.contains("All tasks completed"));

    let status = body_json(app.clone().oneshot(get("/status?rater_id=r1")).await.unwrap().into_body()).await;
    assert_eq!(status["rater_id"], "r1");
    assert_eq!(status["progress"], 3);
    assert_eq!(status["total_tasks"], 3);

    let task = body_text(app.clone().oneshot(get("/task?rater_id=r1")).await.unwrap().into_body()).await;
    assert!(task.contains("All tasks completed"));

    let results = body_json(app.clone().oneshot(get("/results")).await.unwrap().into_body()).await;
    assert_eq!(results["w1"], -2);
    assert_eq!(results["w2"], 0);
    assert_eq!(results["w3"], 2);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let app = setup_app(dir.path());
        let response = answer_current_task(&app, "r1", "1", "1").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    let app = setup_app(dir.path());
    let status = body_json(app.clone().oneshot(get("/status?rater_id=r1")).await.unwrap().into_body()).await;
    assert_eq!(status["progress"], 1);

    let results = body_json(app.oneshot(get("/results")).await.unwrap().into_body()).await;
    let total: i64 = results.as_object().unwrap().values().map(|v| v.as_i64().unwrap()).sum();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn test_rater_id_is_url_encoded_in_redirect() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let response = answer_current_task(&app, "ann%20lee", "1", "0").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/task?rater_id=ann%20lee");
}

// =============================================================================
// Rejected requests
// =============================================================================

#[tokio::test]
async fn test_duplicate_submission_conflicts() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let html = body_text(app.clone().oneshot(get("/task?rater_id=r1")).await.unwrap().into_body()).await;
    let form = format!(
        "rater_id=r1&datapoint_id=dp1&left_weight={}&right_weight={}&left_selected=1&right_selected=0",
        hidden_field(&html, "left_weight"),
        hidden_field(&html, "right_weight"),
    );

    let first = app.clone().oneshot(post_form("/submit", form.clone())).await.unwrap();
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let second = app.clone().oneshot(post_form("/submit", form)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = body_json(second.into_body()).await;
    assert_eq!(body["error"]["code"], "CONFLICT");

    let status = body_json(app.oneshot(get("/status?rater_id=r1")).await.unwrap().into_body()).await;
    assert_eq!(status["progress"], 1);
}

#[tokio::test]
async fn test_submit_for_unknown_rater_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let form = "rater_id=stranger&datapoint_id=dp1&left_weight=w1&right_weight=w2&left_selected=1&right_selected=0";
    let response = app.oneshot(post_form("/submit", form.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_selection_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let response = answer_current_task(&app, "r1", "yes", "0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let results = body_json(app.oneshot(get("/results")).await.unwrap().into_body()).await;
    assert!(results.as_object().unwrap().values().all(|v| v == 0));
}

#[tokio::test]
async fn test_missing_rater_id_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let response = app.clone().oneshot(get("/task")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.oneshot(get("/task?rater_id=")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_of_unseen_rater() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let response = app.oneshot(get("/status?rater_id=nobody")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["progress"], 0);
    assert_eq!(body["total_tasks"], 3);
}

#[tokio::test]
async fn test_failed_save_is_internal_error_and_rolled_back() {
    let definition = ExperimentDefinition::from_json_str(EXPERIMENT).unwrap();
    let tasks = Arc::new(TaskSet::build(&definition).unwrap());
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::open_with_seed(tasks, &definition.weights, store.clone(), 11).unwrap();
    let app = build_router(AppState::new(Arc::new(ledger)), None);

    store.set_fail_saves(true);
    let response = app.clone().oneshot(get("/task?rater_id=r1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");

    // Nothing was kept in memory, so the retry creates the session afresh
    store.set_fail_saves(false);
    let response = answer_current_task(&app, "r1", "1", "0").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(store.save_count(), 2);
}

#[tokio::test]
async fn test_incomplete_form_is_json_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(dir.path());

    let form = "rater_id=r1&datapoint_id=dp1&left_selected=1&right_selected=0";
    let response = app.oneshot(post_form("/submit", form.to_string())).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].as_str().unwrap().contains("left_weight"));
}
