use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use tracing::warn;

use crate::db::tasks;
use crate::error::AppError;
use crate::models::{NewTaskRequest, Task, UpdateTaskRequest};
use crate::services::alarms::AlarmScheduler;
use crate::services::notify::Notifier;

/// Coordinates the task store with the alarm registry and the notification
/// sink, so a task mutation and its side effects are observed together.
#[derive(Clone)]
pub struct TaskService {
    db: SqlitePool,
    alarms: AlarmScheduler,
    notifier: Arc<dyn Notifier>,
}

fn check_reminder(
    remind_at: Option<DateTime<Utc>>,
    due_at: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    if let (Some(remind), Some(due)) = (remind_at, due_at) {
        if remind > due {
            return Err(AppError::BadRequest(
                "reminder must not be after the due date".to_string(),
            ));
        }
    }
    Ok(())
}

impl TaskService {
    pub fn new(db: SqlitePool, alarms: AlarmScheduler, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, alarms, notifier }
    }

    pub async fn create(&self, req: NewTaskRequest) -> Result<Task, AppError> {
        if req.title.trim().is_empty() {
            return Err(AppError::BadRequest("title must not be empty".to_string()));
        }
        check_reminder(req.remind_at, req.due_at)?;

        let task = tasks::insert_task(&self.db, req).await?;
        self.alarms.schedule(&task);
        Ok(task)
    }

    pub async fn update(
        &self,
        id: &str,
        req: UpdateTaskRequest,
    ) -> Result<Option<Task>, AppError> {
        let Some(current) = tasks::find_task_by_id(&self.db, id).await? else {
            return Ok(None);
        };
        if let Some(title) = &req.title {
            if title.trim().is_empty() {
                return Err(AppError::BadRequest("title must not be empty".to_string()));
            }
        }
        let effective_remind = req.remind_at.unwrap_or(current.remind_at);
        let effective_due = req.due_at.unwrap_or(current.due_at);
        check_reminder(effective_remind, effective_due)?;

        let updated = tasks::update_task(&self.db, id, req).await?;
        if let Some(task) = &updated {
            // Replaces any previously armed reminder for this id.
            self.alarms.schedule(task);
        }
        Ok(updated)
    }

    /// Completion toggle plus alarm and notification cleanup, with a
    /// compensating re-arm if the cleanup fails partway: the user either
    /// sees all three effects or none of them.
    pub async fn set_completed(
        &self,
        id: &str,
        completed: bool,
    ) -> Result<Option<Task>, AppError> {
        let Some(updated) = tasks::set_completed(&self.db, id, completed).await? else {
            return Ok(None);
        };

        if completed {
            self.alarms.cancel(id);
            if let Err(e) = self.notifier.dismiss_task_alarm(id) {
                if let Some(reverted) = tasks::set_completed(&self.db, id, false).await? {
                    self.alarms.schedule(&reverted);
                }
                return Err(e);
            }
        } else {
            self.alarms.schedule(&updated);
        }
        Ok(Some(updated))
    }

    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let deleted = tasks::delete_task(&self.db, id).await?;
        if deleted {
            self.alarms.cancel(id);
            if let Err(e) = self.notifier.dismiss_task_alarm(id) {
                warn!("failed to dismiss notification for deleted task {}: {}", id, e);
            }
        }
        Ok(deleted)
    }

    /// Push the reminder forward, clamped to the due date so the
    /// reminder-before-due invariant holds.
    pub async fn snooze(&self, id: &str, minutes: i64) -> Result<Option<Task>, AppError> {
        let Some(task) = tasks::find_task_by_id(&self.db, id).await? else {
            return Ok(None);
        };
        if task.is_completed {
            return Err(AppError::BadRequest(
                "cannot snooze a completed task".to_string(),
            ));
        }

        let mut remind_at = Utc::now() + Duration::minutes(minutes);
        if let Some(due) = task.due_at {
            if remind_at > due {
                remind_at = due;
            }
        }
        tasks::set_schedule(&self.db, id, Some(remind_at), task.due_at).await?;

        if let Err(e) = self.notifier.dismiss_task_alarm(id) {
            warn!("failed to dismiss notification for snoozed task {}: {}", id, e);
        }
        let snoozed = Task {
            remind_at: Some(remind_at),
            ..task
        };
        self.alarms.schedule(&snoozed);
        Ok(Some(snoozed))
    }
}
