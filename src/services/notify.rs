use std::sync::Mutex;

use tracing::info;

use crate::error::AppError;
use crate::models::{Announcement, Task};

/// Sink for system notifications. Raises are keyed by id, so repeating one
/// is harmless; the embedding shell supplies the real implementation and the
/// daemon falls back to [`LogNotifier`].
pub trait Notifier: Send + Sync {
    fn announcement(&self, announcement: &Announcement) -> Result<(), AppError>;
    fn task_alarm(&self, task: &Task) -> Result<(), AppError>;
    fn dismiss_task_alarm(&self, task_id: &str) -> Result<(), AppError>;
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn announcement(&self, announcement: &Announcement) -> Result<(), AppError> {
        info!(
            id = announcement.id,
            title = announcement.notification_title(),
            body = %announcement.notification_body(),
            "announcement notification"
        );
        Ok(())
    }

    fn task_alarm(&self, task: &Task) -> Result<(), AppError> {
        info!(id = %task.id, title = %task.title, "task alarm notification");
        Ok(())
    }

    fn dismiss_task_alarm(&self, task_id: &str) -> Result<(), AppError> {
        info!(id = %task_id, "dismiss task alarm notification");
        Ok(())
    }
}

/// Records every raise and dismissal; used by tests.
#[derive(Default)]
pub struct RecordingNotifier {
    pub announcements: Mutex<Vec<(i64, String, String)>>,
    pub task_alarms: Mutex<Vec<String>>,
    pub dismissed: Mutex<Vec<String>>,
    pub fail_dismiss: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn announcement_ids(&self) -> Vec<i64> {
        self.announcements.lock().unwrap().iter().map(|(id, _, _)| *id).collect()
    }

    pub fn alarm_count(&self) -> usize {
        self.task_alarms.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn announcement(&self, announcement: &Announcement) -> Result<(), AppError> {
        self.announcements.lock().unwrap().push((
            announcement.id,
            announcement.notification_title().to_string(),
            announcement.notification_body(),
        ));
        Ok(())
    }

    fn task_alarm(&self, task: &Task) -> Result<(), AppError> {
        self.task_alarms.lock().unwrap().push(task.id.clone());
        Ok(())
    }

    fn dismiss_task_alarm(&self, task_id: &str) -> Result<(), AppError> {
        if *self.fail_dismiss.lock().unwrap() {
            return Err(AppError::InternalServerError);
        }
        self.dismissed.lock().unwrap().push(task_id.to_string());
        Ok(())
    }
}
