use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chansync_core::SyncError;
use reconciler::ReconcilerConfig;

/// Sync configuration, loaded from environment variables
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database_url: String,
    pub log_file: String,
    /// Directory holding Telegram Desktop exports (`<handle>.json` or `<handle>/result.json`).
    pub export_dir: String,
    pub fetch_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
    pub max_concurrent_channels: usize,
    /// Width of the `sync` window, ending now.
    pub days_back: u32,
}

impl SyncConfig {
    /// Loads configuration from the environment. Call `dotenvy::dotenv()` first so `.env`
    /// values apply.
    pub fn load() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "./telegram_messages.db".to_string());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/chansync.log".to_string());
        let export_dir = env::var("EXPORT_DIR").unwrap_or_else(|_| "./exports".to_string());
        let fetch_timeout_secs = parse_var("FETCH_TIMEOUT_SECS", 30)?;
        let max_concurrent_fetches = parse_var("MAX_CONCURRENT_FETCHES", 4)?;
        let max_concurrent_channels = parse_var("MAX_CONCURRENT_CHANNELS", 4)?;
        let days_back = parse_var("DAYS_BACK", 1)?;

        Ok(Self {
            database_url,
            log_file,
            export_dir,
            fetch_timeout_secs,
            max_concurrent_fetches,
            max_concurrent_channels,
            days_back,
        })
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.fetch_timeout_secs == 0 {
            return Err(SyncError::Config("FETCH_TIMEOUT_SECS must be positive".to_string()));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(SyncError::Config("MAX_CONCURRENT_FETCHES must be positive".to_string()));
        }
        if self.max_concurrent_channels == 0 {
            return Err(SyncError::Config("MAX_CONCURRENT_CHANNELS must be positive".to_string()));
        }
        if self.days_back == 0 {
            return Err(SyncError::Config("DAYS_BACK must be positive".to_string()));
        }
        Ok(())
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig::default()
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_max_concurrent_fetches(self.max_concurrent_fetches)
            .with_max_concurrent_channels(self.max_concurrent_channels)
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
