use std::env;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base: String,
    pub database_url: String,
    pub listen_addr: String,
    pub sync_interval_secs: u64,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let api_base = env::var("CAMPUSD_API_BASE")
            .map_err(|_| AppError::BadRequest("CAMPUSD_API_BASE is not set".to_string()))?;
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://campusd.db".to_string());
        let listen_addr = env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string());
        let sync_interval_secs = env::var("SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15 * 60);

        Ok(Self {
            api_base,
            database_url,
            listen_addr,
            sync_interval_secs,
        })
    }
}
