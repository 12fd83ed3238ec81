use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Upcoming,
    Live,
    Completed,
    // Never derived from time; reserved for the backend marking a lesson
    // cancelled. Kept for wire compatibility.
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub course_code: String,
    pub course_title: String,
    pub lecturer: String,
    pub room: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: i64,
}

impl Lesson {
    /// Status derived from wall-clock time against [start, end) on the
    /// lesson's date: the start boundary is live, the end boundary is not.
    pub fn status_at(&self, now: NaiveDateTime) -> LessonStatus {
        let start = self.date.and_time(self.start_time);
        let end = self.date.and_time(self.end_time);
        if now < start {
            LessonStatus::Upcoming
        } else if now < end {
            LessonStatus::Live
        } else {
            LessonStatus::Completed
        }
    }

    pub fn is_live_at(&self, now: NaiveDateTime) -> bool {
        self.status_at(now) == LessonStatus::Live
    }
}
