use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Cancellation,
    Reschedule,
    RoomChange,
    #[serde(other)]
    Plain,
}

impl MessageKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            MessageKind::Cancellation => "Lesson Cancelled",
            MessageKind::Reschedule => "Lesson Rescheduled",
            MessageKind::RoomChange => "Room Changed",
            MessageKind::Plain => "New Announcement",
        }
    }
}

/// A server announcement. Immutable once fetched; identity is the id, which
/// the backend assigns monotonically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub course_code: String,
    pub course_title: String,
    pub lesson_date: String,
    pub lesson_time: String,
    #[serde(default)]
    pub groups: Vec<String>,
    pub message_type: MessageKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Announcement {
    pub fn notification_title(&self) -> &'static str {
        self.message_type.display_name()
    }

    pub fn notification_body(&self) -> String {
        format!("{}: {}", self.course_code, self.message)
    }
}
