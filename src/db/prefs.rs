use sqlx::SqlitePool;
use tracing::warn;

use crate::models::Session;

const KEY_SESSION: &str = "session";
const KEY_DARK_MODE: &str = "dark_mode";
const KEY_NOTIFICATIONS_ENABLED: &str = "notifications_enabled";
const KEY_ONBOARDING_COMPLETED: &str = "onboarding_completed";
const KEY_LAST_ALERTED_ID: &str = "last_alerted_id";
const KEY_LAST_VIEWED_ID: &str = "last_viewed_id";

pub async fn get(db: &SqlitePool, key: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT value FROM prefs WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
}

pub async fn set(db: &SqlitePool, key: &str, value: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO prefs (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn remove(db: &SqlitePool, key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM prefs WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;
    Ok(())
}

/// The session is one serialized record behind one key, so establishing or
/// tearing it down is a single row write with no torn-read window.
pub async fn session(db: &SqlitePool) -> Result<Option<Session>, sqlx::Error> {
    let Some(raw) = get(db, KEY_SESSION).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(session) => Ok(Some(session)),
        Err(e) => {
            warn!("discarding unreadable session record: {}", e);
            Ok(None)
        }
    }
}

pub async fn set_session(db: &SqlitePool, session: &Session) -> Result<(), sqlx::Error> {
    let raw = serde_json::to_string(session).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    set(db, KEY_SESSION, &raw).await
}

pub async fn clear_session(db: &SqlitePool) -> Result<(), sqlx::Error> {
    remove(db, KEY_SESSION).await
}

pub async fn is_logged_in(db: &SqlitePool) -> Result<bool, sqlx::Error> {
    Ok(session(db).await?.is_some())
}

async fn get_flag(db: &SqlitePool, key: &str, default: bool) -> Result<bool, sqlx::Error> {
    Ok(get(db, key)
        .await?
        .map(|v| v == "true")
        .unwrap_or(default))
}

async fn set_flag(db: &SqlitePool, key: &str, value: bool) -> Result<(), sqlx::Error> {
    set(db, key, if value { "true" } else { "false" }).await
}

pub async fn dark_mode(db: &SqlitePool) -> Result<bool, sqlx::Error> {
    get_flag(db, KEY_DARK_MODE, false).await
}

pub async fn set_dark_mode(db: &SqlitePool, value: bool) -> Result<(), sqlx::Error> {
    set_flag(db, KEY_DARK_MODE, value).await
}

pub async fn notifications_enabled(db: &SqlitePool) -> Result<bool, sqlx::Error> {
    get_flag(db, KEY_NOTIFICATIONS_ENABLED, true).await
}

pub async fn set_notifications_enabled(db: &SqlitePool, value: bool) -> Result<(), sqlx::Error> {
    set_flag(db, KEY_NOTIFICATIONS_ENABLED, value).await
}

pub async fn onboarding_completed(db: &SqlitePool) -> Result<bool, sqlx::Error> {
    get_flag(db, KEY_ONBOARDING_COMPLETED, false).await
}

pub async fn set_onboarding_completed(db: &SqlitePool, value: bool) -> Result<(), sqlx::Error> {
    set_flag(db, KEY_ONBOARDING_COMPLETED, value).await
}

async fn get_watermark(db: &SqlitePool, key: &str) -> Result<i64, sqlx::Error> {
    Ok(get(db, key)
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

/// Monotonic advance in a single statement; a concurrent run carrying a
/// smaller id never moves the watermark backwards.
async fn advance_watermark(db: &SqlitePool, key: &str, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO prefs (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value \
         WHERE CAST(prefs.value AS INTEGER) < CAST(excluded.value AS INTEGER)",
    )
    .bind(key)
    .bind(id.to_string())
    .execute(db)
    .await?;
    Ok(())
}

pub async fn last_alerted_id(db: &SqlitePool) -> Result<i64, sqlx::Error> {
    get_watermark(db, KEY_LAST_ALERTED_ID).await
}

pub async fn advance_last_alerted(db: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    advance_watermark(db, KEY_LAST_ALERTED_ID, id).await
}

pub async fn last_viewed_id(db: &SqlitePool) -> Result<i64, sqlx::Error> {
    get_watermark(db, KEY_LAST_VIEWED_ID).await
}

pub async fn advance_last_viewed(db: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
    advance_watermark(db, KEY_LAST_VIEWED_ID, id).await
}
