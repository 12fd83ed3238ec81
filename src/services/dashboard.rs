use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Local, NaiveDateTime, Timelike, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tracing::warn;

use crate::api::{ScheduleApi, dto::LessonQuery};
use crate::db::{prefs, tasks};
use crate::error::AppError;
use crate::models::{Announcement, Lesson, Task};
use crate::services::pipeline::AnnouncementSync;

const UPCOMING_TASK_LIMIT: i64 = 5;
const RECENT_ANNOUNCEMENT_LIMIT: usize = 5;
const ANNOUNCEMENT_FETCH_SIZE: u32 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct TaskCounts {
    pub pending: i64,
    pub overdue: i64,
}

/// One home-screen state folded from five independently-failing sources.
/// A failed source is absent, not defaulted to empty, and contributes one
/// human-readable error string so the UI can render what it has.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub greeting: String,
    pub lessons: Option<Vec<Lesson>>,
    pub current_lesson: Option<Lesson>,
    pub tasks: Option<Vec<Task>>,
    pub announcements: Option<Vec<Announcement>>,
    pub counts: Option<TaskCounts>,
    pub errors: Vec<String>,
}

impl DashboardSnapshot {
    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DashboardState {
    Loading,
    Ready(DashboardSnapshot),
}

pub fn greeting_for_hour(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        17..=20 => "Good evening",
        _ => "Good night",
    }
}

pub fn current_lesson_at(lessons: &[Lesson], now: NaiveDateTime) -> Option<Lesson> {
    lessons.iter().find(|l| l.is_live_at(now)).cloned()
}

pub struct DashboardService {
    db: SqlitePool,
    api: Arc<dyn ScheduleApi>,
    sync: Arc<AnnouncementSync>,
    state: watch::Sender<DashboardState>,
    refreshing: AtomicBool,
}

impl DashboardService {
    pub fn new(db: SqlitePool, api: Arc<dyn ScheduleApi>, sync: Arc<AnnouncementSync>) -> Self {
        let (state, _) = watch::channel(DashboardState::Loading);
        Self {
            db,
            api,
            sync,
            state,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Continuously-updating view of the dashboard; starts at Loading and
    /// moves to Ready when the first aggregation lands.
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    pub async fn load(&self) -> Result<DashboardSnapshot, AppError> {
        let Some(session) = prefs::session(&self.db).await? else {
            return Err(AppError::NotLoggedIn);
        };

        let now = Local::now();
        let today = now.date_naive();
        let lesson_query = LessonQuery::on(today);
        let (lessons_res, announcements_res, tasks_res, pending_res, overdue_res) = tokio::join!(
            self.api.fetch_lessons(&session.token, &lesson_query),
            self.api
                .fetch_announcements(&session.token, ANNOUNCEMENT_FETCH_SIZE),
            tasks::fetch_upcoming_tasks(&self.db, UPCOMING_TASK_LIMIT),
            tasks::count_pending(&self.db),
            tasks::count_overdue(&self.db, Utc::now()),
        );

        // An expired token fails every remote source the same way; clear
        // the session and surface the expiry rather than a partial board.
        if matches!(lessons_res, Err(AppError::SessionExpired))
            || matches!(announcements_res, Err(AppError::SessionExpired))
        {
            prefs::clear_session(&self.db).await?;
            return Err(AppError::SessionExpired);
        }

        let mut errors = Vec::new();
        let mut absorb = |label: &str, e: AppError| {
            warn!("dashboard source {} failed: {}", label, e);
            errors.push(e.user_message());
        };

        let lessons = match lessons_res {
            Ok(lessons) => Some(lessons),
            Err(e) => {
                absorb("lessons", e);
                None
            }
        };
        let announcements = match announcements_res {
            Ok(mut items) => {
                items.sort_by(|a, b| b.id.cmp(&a.id));
                items.truncate(RECENT_ANNOUNCEMENT_LIMIT);
                Some(items)
            }
            Err(e) => {
                absorb("announcements", e);
                None
            }
        };
        let upcoming = match tasks_res {
            Ok(items) => Some(items),
            Err(e) => {
                absorb("tasks", AppError::Database(e));
                None
            }
        };
        let counts = match (pending_res, overdue_res) {
            (Ok(pending), Ok(overdue)) => Some(TaskCounts { pending, overdue }),
            (Err(e), _) | (_, Err(e)) => {
                absorb("counts", AppError::Database(e));
                None
            }
        };

        let current_lesson = lessons
            .as_deref()
            .and_then(|lessons| current_lesson_at(lessons, now.naive_local()));

        let snapshot = DashboardSnapshot {
            greeting: format!("{}, {}", greeting_for_hour(now.hour()), session.full_name),
            lessons,
            current_lesson,
            tasks: upcoming,
            announcements,
            counts,
            errors,
        };
        let _ = self.state.send(DashboardState::Ready(snapshot.clone()));
        Ok(snapshot)
    }

    /// Pull-to-refresh: re-run the announcement sync, then the whole
    /// aggregation. The refreshing flag drops exactly when the new state
    /// lands, giving the indicator a deterministic end point.
    pub async fn refresh(&self) -> Result<DashboardSnapshot, AppError> {
        self.refreshing.store(true, Ordering::SeqCst);
        if let Err(e) = self.sync.run_once().await {
            warn!("announcement refresh failed: {}", e);
        }
        let result = self.load().await;
        self.refreshing.store(false, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_buckets() {
        assert_eq!(greeting_for_hour(5), "Good morning");
        assert_eq!(greeting_for_hour(11), "Good morning");
        assert_eq!(greeting_for_hour(12), "Good afternoon");
        assert_eq!(greeting_for_hour(16), "Good afternoon");
        assert_eq!(greeting_for_hour(17), "Good evening");
        assert_eq!(greeting_for_hour(20), "Good evening");
        assert_eq!(greeting_for_hour(21), "Good night");
        assert_eq!(greeting_for_hour(4), "Good night");
        assert_eq!(greeting_for_hour(0), "Good night");
    }
}
