use std::env;
use std::path::PathBuf;

use crate::services::loan_service::DEFAULT_FINE_PER_DAY;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    /// Directory behind `/storage`; uploaded covers go to `<cover_dir>/covers`
    pub cover_dir: PathBuf,
    pub fine_per_day: i64,
    /// Period of the background overdue sweep; 0 disables it
    pub overdue_sweep_interval_secs: u64,
    pub profile: String,
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let profile = env::var("PROFILE").unwrap_or_else(|_| "default".to_string());

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            if profile == "default" {
                "sqlite://pustaka.db?mode=rwc".to_string()
            } else {
                format!("sqlite://pustaka_{}.db?mode=rwc", profile)
            }
        });

        Self {
            database_url,
            port: parsed("PORT", 8000),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            cover_dir: env::var("COVER_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("storage")),
            fine_per_day: parsed("FINE_PER_DAY", DEFAULT_FINE_PER_DAY),
            overdue_sweep_interval_secs: parsed("OVERDUE_SWEEP_INTERVAL_SECS", 3600),
            profile,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            cover_dir: PathBuf::from("storage"),
            fine_per_day: DEFAULT_FINE_PER_DAY,
            overdue_sweep_interval_secs: 0,
            profile: "default".to_string(),
        }
    }
}
