use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use campusd::api::StubScheduleApi;
use campusd::db::prefs;
use campusd::routes::router;
use campusd::services::RecordingNotifier;
use campusd::state::AppState;

async fn setup_db() -> SqlitePool {
    // One connection so every handle sees the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    sqlx::query(
        r#"
        CREATE TABLE tasks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            due_at TEXT,
            remind_at TEXT,
            priority TEXT NOT NULL CHECK(priority IN ('low', 'medium', 'high', 'urgent')) DEFAULT 'medium',
            is_completed INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT,
            subject TEXT,
            recurrence TEXT NOT NULL CHECK(recurrence IN ('none', 'daily', 'weekly', 'monthly')) DEFAULT 'none',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await
    .expect("Failed to create tasks table");

    sqlx::query(
        r#"
        CREATE TABLE prefs (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await
    .expect("Failed to create prefs table");

    pool
}

struct TestApp {
    app: Router,
    db: SqlitePool,
    api: Arc<StubScheduleApi>,
}

async fn setup_app() -> TestApp {
    let db = setup_db().await;
    let api = Arc::new(StubScheduleApi::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let (state, _scheduler) = AppState::new(db.clone(), api.clone(), notifier, 900);
    TestApp {
        app: router(state),
        db,
        api,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn login_persists_the_session_and_reads_back() {
    let test = setup_app().await;

    let (status, body) = send(
        &test.app,
        "POST",
        "/auth/login",
        Some(json!({"username": "jdoe", "password": "hunter2"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["full_name"], "Jane Doe");
    assert_eq!(body["username"], "jdoe");

    assert!(prefs::is_logged_in(&test.db).await.unwrap());
    let session = prefs::session(&test.db).await.unwrap().unwrap();
    assert_eq!(session.token, test.api.token);
    assert_eq!(session.email, "jdoe@example.edu");

    let (status, body) = send(&test.app, "GET", "/auth/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logged_in"], true);
    assert_eq!(body["profile"]["full_name"], "Jane Doe");
}

#[tokio::test]
async fn bad_credentials_do_not_establish_a_session() {
    let test = setup_app().await;
    test.api.set_fail_login(true);

    let (status, _) = send(
        &test.app,
        "POST",
        "/auth/login",
        Some(json!({"username": "jdoe", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!prefs::is_logged_in(&test.db).await.unwrap());
}

#[tokio::test]
async fn logout_clears_the_session_and_protected_routes_reject() {
    let test = setup_app().await;
    send(
        &test.app,
        "POST",
        "/auth/login",
        Some(json!({"username": "jdoe", "password": "hunter2"})),
    )
    .await;

    let (status, _) = send(&test.app, "POST", "/auth/logout", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!prefs::is_logged_in(&test.db).await.unwrap());

    let (status, _) = send(&test.app, "GET", "/profile", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&test.app, "GET", "/dashboard", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn task_crud_through_the_router() {
    let test = setup_app().await;

    let (status, created) = send(
        &test.app,
        "POST",
        "/tasks",
        Some(json!({
            "title": "Read chapter 4",
            "priority": "high",
            "subject": "CS101"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, listed) = send(&test.app, "GET", "/tasks?completed=false", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, completed) = send(
        &test.app,
        "POST",
        &format!("/tasks/{}/complete", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["is_completed"], true);

    let (status, _) = send(&test.app, "DELETE", &format!("/tasks/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&test.app, "GET", &format!("/tasks/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_task_payload_is_a_bad_request() {
    let test = setup_app().await;

    let (status, _) = send(
        &test.app,
        "POST",
        "/tasks",
        Some(json!({
            "title": "Broken",
            "due_at": "2024-05-01T09:00:00Z",
            "remind_at": "2024-05-01T18:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dashboard_returns_a_snapshot_once_logged_in() {
    let test = setup_app().await;
    send(
        &test.app,
        "POST",
        "/auth/login",
        Some(json!({"username": "jdoe", "password": "hunter2"})),
    )
    .await;

    let (status, body) = send(&test.app, "GET", "/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["greeting"].as_str().unwrap().ends_with("Jane Doe"));
    assert!(body["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn prefs_round_trip_through_the_router() {
    let test = setup_app().await;

    let (status, body) = send(&test.app, "GET", "/prefs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notifications_enabled"], true);
    assert_eq!(body["dark_mode"], false);

    let (status, body) = send(
        &test.app,
        "PATCH",
        "/prefs",
        Some(json!({"dark_mode": true, "notifications_enabled": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dark_mode"], true);
    assert_eq!(body["notifications_enabled"], false);
}

#[tokio::test]
async fn viewed_watermark_advances_through_the_router() {
    let test = setup_app().await;

    let (status, _) = send(
        &test.app,
        "POST",
        "/announcements/viewed",
        Some(json!({"last_id": 41})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(prefs::last_viewed_id(&test.db).await.unwrap(), 41);

    // A stale screen reporting an older id must not move it back.
    send(
        &test.app,
        "POST",
        "/announcements/viewed",
        Some(json!({"last_id": 12})),
    )
    .await;
    assert_eq!(prefs::last_viewed_id(&test.db).await.unwrap(), 41);
}
