use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::models::{NewTaskRequest, Task, UpdateTaskRequest};

const TASK_COLUMNS: &str = "id, title, description, due_at, remind_at, priority, is_completed, \
     completed_at, subject, recurrence, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    pub subject: Option<String>,
    pub has_reminder: Option<bool>,
}

pub async fn fetch_tasks(db: &SqlitePool, filter: &TaskFilter) -> Result<Vec<Task>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE 1 = 1"
    ));
    if let Some(completed) = filter.completed {
        qb.push(" AND is_completed = ").push_bind(completed);
    }
    if let Some(from) = filter.due_from {
        qb.push(" AND due_at >= ").push_bind(from);
    }
    if let Some(to) = filter.due_to {
        qb.push(" AND due_at <= ").push_bind(to);
    }
    if let Some(subject) = &filter.subject {
        qb.push(" AND subject = ").push_bind(subject.clone());
    }
    if let Some(has_reminder) = filter.has_reminder {
        if has_reminder {
            qb.push(" AND remind_at IS NOT NULL");
        } else {
            qb.push(" AND remind_at IS NULL");
        }
    }
    qb.push(" ORDER BY is_completed, due_at IS NULL, due_at ASC, created_at ASC");

    qb.build_query_as::<Task>().fetch_all(db).await
}

/// Open tasks ordered by due date, soonest first, for the dashboard.
pub async fn fetch_upcoming_tasks(db: &SqlitePool, limit: i64) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks \
         WHERE is_completed = 0 \
         ORDER BY due_at IS NULL, due_at ASC, \
            CASE priority \
                WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 \
                WHEN 'medium' THEN 2 ELSE 3 \
            END \
         LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Incomplete tasks carrying a reminder, the set re-armed at boot.
pub async fn fetch_tasks_with_reminders(db: &SqlitePool) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks \
         WHERE is_completed = 0 AND remind_at IS NOT NULL \
         ORDER BY remind_at ASC"
    ))
    .fetch_all(db)
    .await
}

pub async fn find_task_by_id(db: &SqlitePool, id: &str) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_task(db: &SqlitePool, req: NewTaskRequest) -> Result<Task, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO tasks \
            (id, title, description, due_at, remind_at, priority, is_completed, \
             completed_at, subject, recurrence, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, 0, NULL, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.due_at)
    .bind(req.remind_at)
    .bind(req.priority)
    .bind(&req.subject)
    .bind(req.recurrence)
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    Ok(Task {
        id,
        title: req.title,
        description: req.description,
        due_at: req.due_at,
        remind_at: req.remind_at,
        priority: req.priority,
        is_completed: false,
        completed_at: None,
        subject: req.subject,
        recurrence: req.recurrence,
        created_at: now,
        updated_at: now,
    })
}

pub async fn update_task(
    db: &SqlitePool,
    id: &str,
    req: UpdateTaskRequest,
) -> Result<Option<Task>, sqlx::Error> {
    let mut current = match find_task_by_id(db, id).await? {
        Some(t) => t,
        None => return Ok(None),
    };

    if let Some(title) = req.title {
        current.title = title;
    }
    if let Some(description) = req.description {
        current.description = description;
    }
    if let Some(due_at) = req.due_at {
        current.due_at = due_at;
    }
    if let Some(remind_at) = req.remind_at {
        current.remind_at = remind_at;
    }
    if let Some(priority) = req.priority {
        current.priority = priority;
    }
    if let Some(subject) = req.subject {
        current.subject = subject;
    }
    if let Some(recurrence) = req.recurrence {
        current.recurrence = recurrence;
    }
    current.updated_at = Utc::now();

    sqlx::query(
        "UPDATE tasks \
         SET title = ?, description = ?, due_at = ?, remind_at = ?, priority = ?, \
             subject = ?, recurrence = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&current.title)
    .bind(&current.description)
    .bind(current.due_at)
    .bind(current.remind_at)
    .bind(current.priority)
    .bind(&current.subject)
    .bind(current.recurrence)
    .bind(current.updated_at)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn set_completed(
    db: &SqlitePool,
    id: &str,
    completed: bool,
) -> Result<Option<Task>, sqlx::Error> {
    let now = Utc::now();
    let completed_at = completed.then_some(now);
    let result = sqlx::query(
        "UPDATE tasks SET is_completed = ?, completed_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(completed)
    .bind(completed_at)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    find_task_by_id(db, id).await
}

/// Persist a rollover or snooze: reminder and due move together.
pub async fn set_schedule(
    db: &SqlitePool,
    id: &str,
    remind_at: Option<DateTime<Utc>>,
    due_at: Option<DateTime<Utc>>,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE tasks SET remind_at = ?, due_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(remind_at)
    .bind(due_at)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_task(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_pending(db: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE is_completed = 0")
        .fetch_one(db)
        .await
}

pub async fn count_overdue(db: &SqlitePool, now: DateTime<Utc>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM tasks WHERE is_completed = 0 AND due_at IS NOT NULL AND due_at < ?",
    )
    .bind(now)
    .fetch_one(db)
    .await
}
