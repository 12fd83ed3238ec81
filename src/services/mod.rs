pub mod alarms;
pub mod dashboard;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod tasks;

pub use alarms::AlarmScheduler;
pub use dashboard::{DashboardService, DashboardSnapshot, DashboardState, TaskCounts};
pub use notify::{LogNotifier, Notifier, RecordingNotifier};
pub use pipeline::{AnnouncementSync, SyncOutcome, SyncStats};
pub use scheduler::{SyncHandle, SyncScheduler};
pub use tasks::TaskService;
