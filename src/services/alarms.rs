use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::db::tasks;
use crate::error::AppError;
use crate::models::Task;
use crate::services::notify::Notifier;

/// One-shot reminder timers, one per task id. Re-scheduling a task replaces
/// its timer rather than duplicating it, and a timer firing for a deleted or
/// completed task is a silent no-op, so stale registrations are harmless.
///
/// Timers live only as long as the process; `rearm_pending` rebuilds the
/// whole set from the stored tasks at startup.
#[derive(Clone)]
pub struct AlarmScheduler {
    db: SqlitePool,
    notifier: Arc<dyn Notifier>,
    pending: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl AlarmScheduler {
    pub fn new(db: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            notifier,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn schedule(&self, task: &Task) {
        self.cancel(&task.id);
        if task.is_completed {
            return;
        }
        let Some(remind_at) = task.remind_at else {
            return;
        };

        // Past reminders fire immediately.
        let delay = (remind_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let scheduler = self.clone();
        let id = task.id.clone();
        // The lock is held across the spawn so a zero-delay fire cannot
        // remove its entry before the handle is registered.
        let mut pending = self.pending.lock().unwrap();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(&id).await;
        });
        pending.insert(task.id.clone(), handle);
    }

    pub fn cancel(&self, task_id: &str) {
        if let Some(handle) = self.pending.lock().unwrap().remove(task_id) {
            handle.abort();
        }
    }

    pub fn is_scheduled(&self, task_id: &str) -> bool {
        self.pending.lock().unwrap().contains_key(task_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Re-derive every still-pending reminder from the stored task set.
    pub async fn rearm_pending(&self) -> Result<usize, AppError> {
        let due = tasks::fetch_tasks_with_reminders(&self.db).await?;
        for task in &due {
            self.schedule(task);
        }
        Ok(due.len())
    }

    async fn fire(&self, task_id: &str) {
        self.pending.lock().unwrap().remove(task_id);

        let task = match tasks::find_task_by_id(&self.db, task_id).await {
            Ok(Some(task)) => task,
            // Deleted since the alarm was armed; stale, safe to ignore.
            Ok(None) => return,
            Err(e) => {
                warn!("alarm fire could not load task {}: {}", task_id, e);
                return;
            }
        };
        if task.is_completed {
            return;
        }

        if let Err(e) = self.notifier.task_alarm(&task) {
            warn!("failed to raise alarm notification for {}: {}", task_id, e);
        }

        // Recurrence rollover: reminder and due advance together so the
        // reminder-before-due invariant holds for the next occurrence.
        if let Some((next_remind, next_due)) = task.next_occurrence() {
            match tasks::set_schedule(&self.db, task_id, Some(next_remind), next_due).await {
                Ok(true) => {
                    let mut next = task;
                    next.remind_at = Some(next_remind);
                    next.due_at = next_due;
                    self.schedule(&next);
                }
                Ok(false) => {}
                Err(e) => warn!("failed to persist rollover for {}: {}", task_id, e),
            }
        }
    }
}
