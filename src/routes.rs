use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::api::dto::LessonQuery;
use crate::db::{prefs, tasks::TaskFilter, tasks as task_store};
use crate::error::AppError;
use crate::models::{Lesson, LessonStatus, NewTaskRequest, Session, Task, UpdateTaskRequest};
use crate::services::pipeline::SyncOutcome;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session_info))
        .route("/profile", get(profile))
        .route("/profile/password", post(change_password))
        .route("/lessons", get(list_lessons).post(create_lesson))
        .route("/lessons/{id}", patch(update_lesson).delete(delete_lesson))
        .route("/announcements", get(list_announcements))
        .route("/announcements/viewed", post(mark_announcements_viewed))
        .route("/announcements/{id}", get(get_announcement))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task).patch(update_task).delete(delete_task))
        .route("/tasks/{id}/complete", post(complete_task))
        .route("/tasks/{id}/reopen", post(reopen_task))
        .route("/tasks/{id}/snooze", post(snooze_task))
        .route("/dashboard", get(dashboard))
        .route("/dashboard/refresh", post(refresh_dashboard))
        .route("/prefs", get(get_prefs).patch(update_prefs))
        .route("/sync", post(sync_now))
        .with_state(state)
}

async fn require_session(db: &SqlitePool) -> Result<Session, AppError> {
    prefs::session(db).await?.ok_or(AppError::NotLoggedIn)
}

/// No refresh endpoint exists, so an expired token forces a re-login: the
/// session record is cleared before the error is surfaced.
async fn remote<T>(db: &SqlitePool, result: Result<T, AppError>) -> Result<T, AppError> {
    if matches!(result, Err(AppError::SessionExpired)) {
        prefs::clear_session(db).await?;
    }
    result
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct SessionView {
    user_id: i64,
    username: String,
    full_name: String,
    email: String,
    user_type: String,
    group_name: Option<String>,
}

impl From<&Session> for SessionView {
    fn from(s: &Session) -> Self {
        Self {
            user_id: s.user_id,
            username: s.username.clone(),
            full_name: s.full_name.clone(),
            email: s.email.clone(),
            user_type: s.user_type.clone(),
            group_name: s.group_name.clone(),
        }
    }
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionView>, AppError> {
    let token = state.api.login(&req.username, &req.password).await?;
    let profile = state.api.fetch_profile(&token).await?;

    let session = Session {
        token,
        user_id: profile.id,
        user_type: profile.user_type,
        username: profile.username,
        full_name: profile.full_name,
        email: profile.email,
        group_name: profile.group_name,
    };
    prefs::set_session(&state.db, &session).await?;

    // Freshly logged in; pick up any announcements right away.
    state.sync.request_sync();

    Ok(Json(SessionView::from(&session)))
}

async fn logout(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    // The contract has no server-side invalidation; clearing the local
    // session always succeeds from the user's point of view.
    prefs::clear_session(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct SessionInfo {
    logged_in: bool,
    profile: Option<SessionView>,
}

async fn session_info(State(state): State<AppState>) -> Result<Json<SessionInfo>, AppError> {
    let session = prefs::session(&state.db).await?;
    Ok(Json(SessionInfo {
        logged_in: session.is_some(),
        profile: session.as_ref().map(SessionView::from),
    }))
}

async fn profile(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    let session = require_session(&state.db).await?;
    Ok(Json(SessionView::from(&session)))
}

#[derive(Deserialize)]
struct ChangePasswordBody {
    old_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordBody>,
) -> Result<StatusCode, AppError> {
    let session = require_session(&state.db).await?;
    remote(
        &state.db,
        state
            .api
            .change_password(&session.token, &req.old_password, &req.new_password)
            .await,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct LessonView {
    #[serde(flatten)]
    lesson: Lesson,
    status: LessonStatus,
}

async fn list_lessons(
    State(state): State<AppState>,
    Query(query): Query<LessonQuery>,
) -> Result<Json<Vec<LessonView>>, AppError> {
    let session = require_session(&state.db).await?;
    let lessons = remote(
        &state.db,
        state.api.fetch_lessons(&session.token, &query).await,
    )
    .await?;

    let now = Local::now().naive_local();
    Ok(Json(
        lessons
            .into_iter()
            .map(|lesson| LessonView {
                status: lesson.status_at(now),
                lesson,
            })
            .collect(),
    ))
}

async fn create_lesson(
    State(state): State<AppState>,
    Json(req): Json<crate::api::dto::NewLessonRequest>,
) -> Result<Json<Lesson>, AppError> {
    let session = require_session(&state.db).await?;
    let lesson = remote(
        &state.db,
        state.api.create_lesson(&session.token, &req).await,
    )
    .await?;
    Ok(Json(lesson))
}

async fn update_lesson(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<crate::api::dto::UpdateLessonRequest>,
) -> Result<Json<Lesson>, AppError> {
    let session = require_session(&state.db).await?;
    let lesson = remote(
        &state.db,
        state.api.update_lesson(&session.token, id, &req).await,
    )
    .await?;
    Ok(Json(lesson))
}

async fn delete_lesson(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let session = require_session(&state.db).await?;
    remote(
        &state.db,
        state.api.delete_lesson(&session.token, id).await,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct AnnouncementListQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct AnnouncementList {
    items: Vec<crate::models::Announcement>,
    last_viewed_id: i64,
    unread: usize,
}

async fn list_announcements(
    State(state): State<AppState>,
    Query(query): Query<AnnouncementListQuery>,
) -> Result<Json<AnnouncementList>, AppError> {
    let session = require_session(&state.db).await?;
    let mut items = remote(
        &state.db,
        state.api.fetch_announcements(&session.token, 50).await,
    )
    .await?;

    // The backend's ordering is unspecified; newest first for display.
    items.sort_by(|a, b| b.id.cmp(&a.id));
    items.truncate(query.limit.unwrap_or(50));

    let last_viewed_id = prefs::last_viewed_id(&state.db).await?;
    let unread = items.iter().filter(|a| a.id > last_viewed_id).count();
    Ok(Json(AnnouncementList {
        items,
        last_viewed_id,
        unread,
    }))
}

#[derive(Deserialize)]
struct MarkViewedRequest {
    last_id: i64,
}

async fn mark_announcements_viewed(
    State(state): State<AppState>,
    Json(req): Json<MarkViewedRequest>,
) -> Result<StatusCode, AppError> {
    prefs::advance_last_viewed(&state.db, req.last_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_announcement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<crate::models::Announcement>, AppError> {
    let session = require_session(&state.db).await?;
    let announcement = remote(
        &state.db,
        state.api.fetch_announcement(&session.token, id).await,
    )
    .await?;
    Ok(Json(announcement))
}

#[derive(Deserialize)]
struct TaskListQuery {
    completed: Option<bool>,
    due_from: Option<DateTime<Utc>>,
    due_to: Option<DateTime<Utc>>,
    subject: Option<String>,
    has_reminder: Option<bool>,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<Task>>, AppError> {
    let filter = TaskFilter {
        completed: query.completed,
        due_from: query.due_from,
        due_to: query.due_to,
        subject: query.subject,
        has_reminder: query.has_reminder,
    };
    let tasks = task_store::fetch_tasks(&state.db, &filter).await?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<NewTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let task = state.tasks.create(req).await?;
    Ok(Json(task))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let task = task_store::find_task_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let task = state
        .tasks
        .update(&id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.tasks.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn complete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let task = state
        .tasks
        .set_completed(&id, true)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

async fn reopen_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, AppError> {
    let task = state
        .tasks
        .set_completed(&id, false)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

#[derive(Deserialize)]
struct SnoozeRequest {
    minutes: Option<i64>,
}

async fn snooze_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SnoozeRequest>,
) -> Result<Json<Task>, AppError> {
    let task = state
        .tasks
        .snooze(&id, req.minutes.unwrap_or(10))
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<crate::services::DashboardSnapshot>, AppError> {
    let snapshot = state.dashboard.load().await?;
    Ok(Json(snapshot))
}

async fn refresh_dashboard(
    State(state): State<AppState>,
) -> Result<Json<crate::services::DashboardSnapshot>, AppError> {
    let snapshot = state.dashboard.refresh().await?;
    Ok(Json(snapshot))
}

#[derive(Serialize)]
struct PrefsResponse {
    dark_mode: bool,
    notifications_enabled: bool,
    onboarding_completed: bool,
}

async fn get_prefs(State(state): State<AppState>) -> Result<Json<PrefsResponse>, AppError> {
    Ok(Json(PrefsResponse {
        dark_mode: prefs::dark_mode(&state.db).await?,
        notifications_enabled: prefs::notifications_enabled(&state.db).await?,
        onboarding_completed: prefs::onboarding_completed(&state.db).await?,
    }))
}

#[derive(Deserialize)]
struct UpdatePrefsRequest {
    dark_mode: Option<bool>,
    notifications_enabled: Option<bool>,
    onboarding_completed: Option<bool>,
}

async fn update_prefs(
    State(state): State<AppState>,
    Json(req): Json<UpdatePrefsRequest>,
) -> Result<Json<PrefsResponse>, AppError> {
    if let Some(dark_mode) = req.dark_mode {
        prefs::set_dark_mode(&state.db, dark_mode).await?;
    }
    if let Some(enabled) = req.notifications_enabled {
        prefs::set_notifications_enabled(&state.db, enabled).await?;
        if enabled {
            // Mirrors notification permission being freshly granted.
            state.sync.request_sync();
        }
    }
    if let Some(done) = req.onboarding_completed {
        prefs::set_onboarding_completed(&state.db, done).await?;
    }
    get_prefs(State(state)).await
}

async fn sync_now(State(state): State<AppState>) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = state.announcement_sync.run_once().await?;
    Ok(Json(outcome))
}
