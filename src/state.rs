use std::sync::Arc;

use sqlx::SqlitePool;

use crate::api::ScheduleApi;
use crate::services::{
    AlarmScheduler, AnnouncementSync, DashboardService, Notifier, SyncHandle, SyncScheduler,
    TaskService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub api: Arc<dyn ScheduleApi>,
    pub alarms: AlarmScheduler,
    pub tasks: TaskService,
    pub dashboard: Arc<DashboardService>,
    pub announcement_sync: Arc<AnnouncementSync>,
    pub sync: SyncHandle,
}

impl AppState {
    /// Wires the services together; the caller spawns the returned
    /// scheduler.
    pub fn new(
        db: SqlitePool,
        api: Arc<dyn ScheduleApi>,
        notifier: Arc<dyn Notifier>,
        sync_interval_secs: u64,
    ) -> (Self, SyncScheduler) {
        let announcement_sync = Arc::new(AnnouncementSync::new(
            db.clone(),
            api.clone(),
            notifier.clone(),
        ));
        let (scheduler, sync) = SyncScheduler::new(announcement_sync.clone(), sync_interval_secs);
        let alarms = AlarmScheduler::new(db.clone(), notifier.clone());
        let tasks = TaskService::new(db.clone(), alarms.clone(), notifier);
        let dashboard = Arc::new(DashboardService::new(
            db.clone(),
            api.clone(),
            announcement_sync.clone(),
        ));

        (
            Self {
                db,
                api,
                alarms,
                tasks,
                dashboard,
                announcement_sync,
                sync,
            },
            scheduler,
        )
    }
}
