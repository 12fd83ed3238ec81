pub mod announcement;
pub mod lesson;
pub mod session;
pub mod task;

pub use announcement::{Announcement, MessageKind};
pub use lesson::{Lesson, LessonStatus};
pub use session::Session;
pub use task::{NewTaskRequest, Priority, Recurrence, Task, UpdateTaskRequest};
