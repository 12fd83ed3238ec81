use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campusd::api::HttpScheduleApi;
use campusd::config::AppConfig;
use campusd::db::prefs;
use campusd::routes::router;
use campusd::services::LogNotifier;
use campusd::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "campusd=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::new_from_env()?;

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let api = Arc::new(HttpScheduleApi::new(&config.api_base)?);
    let notifier = Arc::new(LogNotifier);
    let (state, scheduler) =
        AppState::new(pool.clone(), api, notifier, config.sync_interval_secs);

    // Task reminder alarms do not survive a restart; rebuild them from the
    // stored task set before anything else runs.
    let rearmed = state.alarms.rearm_pending().await?;
    info!("re-armed {} task reminders", rearmed);

    tokio::spawn(scheduler.start());

    // App opened with an existing session: catch up on announcements now
    // rather than waiting out the first interval.
    if prefs::is_logged_in(&pool).await? {
        state.sync.request_sync();
    }

    let app = router(state);

    info!("listening on http://{}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
