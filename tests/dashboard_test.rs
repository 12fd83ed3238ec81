use std::sync::Arc;

use chrono::{Duration, Local, NaiveTime, TimeZone, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use campusd::api::StubScheduleApi;
use campusd::db::prefs;
use campusd::error::AppError;
use campusd::models::{Announcement, Lesson, MessageKind, NewTaskRequest, Priority, Recurrence, Session};
use campusd::services::{
    AlarmScheduler, AnnouncementSync, DashboardService, RecordingNotifier, TaskService,
};

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

fn session() -> Session {
    Session {
        token: "stub-token".to_string(),
        user_id: 1,
        user_type: "student".to_string(),
        username: "jdoe".to_string(),
        full_name: "Jane Doe".to_string(),
        email: "jdoe@example.edu".to_string(),
        group_name: Some("G1".to_string()),
    }
}

fn announcement(id: i64) -> Announcement {
    Announcement {
        id,
        course_code: "CS101".to_string(),
        course_title: "Intro to Computing".to_string(),
        lesson_date: "2024-03-12".to_string(),
        lesson_time: "10:00".to_string(),
        groups: vec!["G1".to_string()],
        message_type: MessageKind::RoomChange,
        message: format!("announcement {}", id),
        created_at: Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
    }
}

fn lesson_all_day_today() -> Lesson {
    Lesson {
        id: 1,
        course_code: "CS101".to_string(),
        course_title: "Intro to Computing".to_string(),
        lecturer: "Dr. Okafor".to_string(),
        room: Some("B204".to_string()),
        groups: vec!["G1".to_string()],
        date: Local::now().date_naive(),
        start_time: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
        duration_minutes: 1439,
    }
}

fn dashboard(db: &SqlitePool, api: Arc<StubScheduleApi>) -> DashboardService {
    let notifier = Arc::new(RecordingNotifier::default());
    let sync = Arc::new(AnnouncementSync::new(db.clone(), api.clone(), notifier));
    DashboardService::new(db.clone(), api, sync)
}

#[tokio::test]
async fn full_success_carries_every_source() {
    let db = setup_db().await;
    prefs::set_session(&db, &session()).await.unwrap();

    let api = Arc::new(StubScheduleApi::default());
    api.set_lessons(vec![lesson_all_day_today()]);
    api.set_announcements(vec![announcement(1), announcement(2)]);

    let notifier = Arc::new(RecordingNotifier::default());
    let alarms = AlarmScheduler::new(db.clone(), notifier.clone());
    let tasks = TaskService::new(db.clone(), alarms, notifier);
    tasks
        .create(NewTaskRequest {
            title: "Read chapter 4".to_string(),
            description: None,
            due_at: Some(Utc::now() + Duration::days(1)),
            remind_at: None,
            priority: Priority::Medium,
            subject: None,
            recurrence: Recurrence::None,
        })
        .await
        .unwrap();

    let snapshot = dashboard(&db, api).load().await.unwrap();

    assert!(!snapshot.is_partial());
    assert_eq!(snapshot.lessons.as_ref().unwrap().len(), 1);
    assert_eq!(snapshot.tasks.as_ref().unwrap().len(), 1);
    // Newest announcement first.
    assert_eq!(snapshot.announcements.as_ref().unwrap()[0].id, 2);
    let counts = snapshot.counts.as_ref().unwrap();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.overdue, 0);
    // The all-day lesson contains "now".
    assert_eq!(snapshot.current_lesson.as_ref().unwrap().id, 1);
    assert!(snapshot.greeting.ends_with("Jane Doe"));
}

#[tokio::test]
async fn failed_lesson_source_degrades_to_partial() {
    let db = setup_db().await;
    prefs::set_session(&db, &session()).await.unwrap();

    let api = Arc::new(StubScheduleApi::default());
    api.set_announcements(vec![announcement(1)]);
    api.set_fail_lessons(true);

    let snapshot = dashboard(&db, api).load().await.unwrap();

    assert!(snapshot.is_partial());
    // Failed source is absent, not an empty default.
    assert!(snapshot.lessons.is_none());
    assert!(snapshot.current_lesson.is_none());
    assert!(snapshot.tasks.is_some());
    assert!(snapshot.announcements.is_some());
    assert!(snapshot.counts.is_some());
    assert_eq!(snapshot.errors.len(), 1);
}

#[tokio::test]
async fn both_remote_sources_failing_yields_two_errors() {
    let db = setup_db().await;
    prefs::set_session(&db, &session()).await.unwrap();

    let api = Arc::new(StubScheduleApi::default());
    api.set_fail_lessons(true);
    api.set_fail_announcements(true);

    let snapshot = dashboard(&db, api).load().await.unwrap();

    assert!(snapshot.lessons.is_none());
    assert!(snapshot.announcements.is_none());
    assert!(snapshot.tasks.is_some());
    assert_eq!(snapshot.errors.len(), 2);
}

#[tokio::test]
async fn expired_token_clears_the_session_instead_of_a_partial_board() {
    let db = setup_db().await;
    prefs::set_session(&db, &session()).await.unwrap();

    let api = Arc::new(StubScheduleApi::default());
    api.set_expire_token(true);

    let result = dashboard(&db, api).load().await;

    assert!(matches!(result, Err(AppError::SessionExpired)));
    assert!(!prefs::is_logged_in(&db).await.unwrap());
}

#[tokio::test]
async fn load_without_session_is_an_error() {
    let db = setup_db().await;
    let api = Arc::new(StubScheduleApi::default());

    let result = dashboard(&db, api).load().await;
    assert!(matches!(result, Err(AppError::NotLoggedIn)));
}

#[tokio::test]
async fn refresh_reruns_announcement_sync_and_clears_the_flag() {
    let db = setup_db().await;
    prefs::set_session(&db, &session()).await.unwrap();

    let api = Arc::new(StubScheduleApi::default());
    api.set_announcements(vec![announcement(1), announcement(2)]);
    let service = dashboard(&db, api);

    let snapshot = service.refresh().await.unwrap();

    assert!(!service.is_refreshing());
    assert!(!snapshot.is_partial());
    // The refresh ran the notification sync, so the watermark moved.
    assert_eq!(prefs::last_alerted_id(&db).await.unwrap(), 2);
}

#[tokio::test]
async fn subscriber_sees_loading_then_ready() {
    let db = setup_db().await;
    prefs::set_session(&db, &session()).await.unwrap();

    let api = Arc::new(StubScheduleApi::default());
    let service = dashboard(&db, api);
    let rx = service.subscribe();

    assert!(matches!(
        *rx.borrow(),
        campusd::services::DashboardState::Loading
    ));

    service.load().await.unwrap();

    assert!(matches!(
        *rx.borrow(),
        campusd::services::DashboardState::Ready(_)
    ));
}
