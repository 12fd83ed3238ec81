use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::services::pipeline::AnnouncementSync;

/// On-demand trigger for an immediate sync run: login, app open with an
/// existing session, notifications re-enabled.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<()>,
}

impl SyncHandle {
    pub fn request_sync(&self) {
        // A full queue already has a run pending; the run is idempotent.
        let _ = self.tx.try_send(());
    }
}

/// Periodic announcement sync, plus the on-demand channel. Both trigger
/// paths funnel into the same idempotent run, so racing them is safe.
pub struct SyncScheduler {
    sync: Arc<AnnouncementSync>,
    interval: Duration,
    rx: mpsc::Receiver<()>,
}

impl SyncScheduler {
    pub fn new(sync: Arc<AnnouncementSync>, interval_secs: u64) -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::channel(4);
        (
            Self {
                sync,
                interval: Duration::from_secs(interval_secs),
                rx,
            },
            SyncHandle { tx },
        )
    }

    pub async fn start(mut self) {
        info!("Starting sync scheduler (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.sync.run_scheduled().await;
                }
                received = self.rx.recv() => {
                    if received.is_none() {
                        return;
                    }
                    // Immediate one-off run; no retry, failures are logged only.
                    if let Err(e) = self.sync.run_once().await {
                        warn!("on-demand sync failed: {}", e);
                    }
                }
            }
        }
    }
}
