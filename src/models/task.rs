use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Recurrence {
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Default for Recurrence {
    fn default() -> Self {
        Recurrence::None
    }
}

impl Recurrence {
    /// Next occurrence of a timestamp under this recurrence, or `None` for
    /// non-recurring tasks.
    pub fn advance(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Recurrence::None => None,
            Recurrence::Daily => Some(at + Duration::days(1)),
            Recurrence::Weekly => Some(at + Duration::weeks(1)),
            Recurrence::Monthly => at.checked_add_months(Months::new(1)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub subject: Option<String>,
    pub recurrence: Recurrence,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Reminder and due timestamps for the next occurrence, advanced
    /// together so the reminder-before-due invariant survives the rollover.
    /// The reminder is clamped to the new due timestamp if the intervals
    /// ever drift apart.
    pub fn next_occurrence(&self) -> Option<(DateTime<Utc>, Option<DateTime<Utc>>)> {
        let remind = self.remind_at?;
        let next_remind = self.recurrence.advance(remind)?;
        let next_due = match self.due_at {
            Some(due) => Some(self.recurrence.advance(due)?),
            None => None,
        };
        match next_due {
            Some(due) if next_remind > due => Some((due, Some(due))),
            _ => Some((next_remind, next_due)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    pub subject: Option<String>,
    #[serde(default)]
    pub recurrence: Recurrence,
}

/// Absent field: leave as is. Present-but-null: clear. The nullable
/// columns use the double-`Option` to tell the two apart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub remind_at: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
    pub subject: Option<Option<String>>,
    pub recurrence: Option<Recurrence>,
}
