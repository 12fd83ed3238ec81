use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::api::ScheduleApi;
use crate::db::prefs;
use crate::error::AppError;
use crate::services::notify::Notifier;

/// One page approximating "all current announcements".
const ANNOUNCEMENT_PAGE_SIZE: u32 = 200;

/// A fresh install never had a watermark; cap the backlog shown so a new
/// user is not flooded with historical notifications.
const FIRST_SYNC_LIMIT: usize = 3;

const SCHEDULED_ATTEMPTS: u32 = 3;

#[derive(Debug, Default, Serialize)]
pub struct SyncStats {
    pub fetched: usize,
    pub notified: usize,
    pub watermark: i64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Notifications disabled or no session; a no-op, not an error.
    Skipped,
    Completed(SyncStats),
}

/// The announcement half of the notification delivery pipeline. `run_once`
/// is idempotent and safe against concurrent runs: dedup rests on the
/// monotonic last-alerted watermark plus id-keyed notification raises, so
/// no lock is taken.
pub struct AnnouncementSync {
    db: SqlitePool,
    api: Arc<dyn ScheduleApi>,
    notifier: Arc<dyn Notifier>,
    retry_base: Duration,
}

impl AnnouncementSync {
    pub fn new(db: SqlitePool, api: Arc<dyn ScheduleApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            api,
            notifier,
            retry_base: Duration::from_secs(1),
        }
    }

    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    pub async fn run_once(&self) -> Result<SyncOutcome, AppError> {
        if !prefs::notifications_enabled(&self.db).await? {
            return Ok(SyncOutcome::Skipped);
        }
        let Some(session) = prefs::session(&self.db).await? else {
            return Ok(SyncOutcome::Skipped);
        };

        let fetched = match self
            .api
            .fetch_announcements(&session.token, ANNOUNCEMENT_PAGE_SIZE)
            .await
        {
            Ok(fetched) => fetched,
            // An expired token never recovers on its own; drop the session
            // now so the next screen forces a re-login instead of every
            // tick repeating the doomed fetch.
            Err(AppError::SessionExpired) => {
                warn!("announcement sync token expired, clearing session");
                prefs::clear_session(&self.db).await?;
                return Ok(SyncOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };
        let watermark = prefs::last_alerted_id(&self.db).await?;

        // Oldest-new first preserves chronological presentation order.
        let mut fresh: Vec<_> = fetched.iter().filter(|a| a.id > watermark).collect();
        fresh.sort_by_key(|a| a.id);

        if watermark == 0 && fresh.len() > FIRST_SYNC_LIMIT {
            fresh = fresh.split_off(fresh.len() - FIRST_SYNC_LIMIT);
        }

        for &announcement in &fresh {
            if let Err(e) = self.notifier.announcement(announcement) {
                warn!("failed to raise notification for {}: {}", announcement.id, e);
            }
        }

        // Advance over the full fetched set, not just the shown subset, so
        // first-sync suppressed items are never shown by a later run.
        let max_id = fetched.iter().map(|a| a.id).max();
        if let Some(max_id) = max_id {
            prefs::advance_last_alerted(&self.db, max_id).await?;
        }

        Ok(SyncOutcome::Completed(SyncStats {
            fetched: fetched.len(),
            notified: fresh.len(),
            watermark: max_id.unwrap_or(watermark).max(watermark),
        }))
    }

    /// Scheduled-trigger entry: a bounded retry with doubling backoff, then
    /// give up silently. Background failures never reach the user.
    pub async fn run_scheduled(&self) {
        let mut backoff = self.retry_base;
        for attempt in 1..=SCHEDULED_ATTEMPTS {
            match self.run_once().await {
                Ok(SyncOutcome::Skipped) => return,
                Ok(SyncOutcome::Completed(stats)) => {
                    info!(
                        "announcement sync completed - fetched {}, notified {}, watermark {}",
                        stats.fetched, stats.notified, stats.watermark
                    );
                    return;
                }
                Err(e) => {
                    warn!("announcement sync attempt {} failed: {}", attempt, e);
                    if attempt < SCHEDULED_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }
    }
}
