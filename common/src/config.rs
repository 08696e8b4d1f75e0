//! Process-wide configuration loaded from environment variables.
//!
//! Every knob has a development-friendly default so the test suite and local
//! tooling run without a `.env` file; production deployments are expected to
//! set at least `DATABASE_PATH` and `JWT_SECRET`.

use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: i64,
    /// TTL applied when an issuance request does not specify one.
    pub credential_ttl_seconds: i64,
    /// Requested TTLs are clamped into `[min, max]`: one policy for every
    /// transport, not a per-route constant.
    pub credential_ttl_min_seconds: i64,
    pub credential_ttl_max_seconds: i64,
    /// Expired credentials are kept around this long before the sweeper
    /// deletes them.
    pub credential_purge_grace_seconds: i64,
    pub credential_sweep_interval_seconds: u64,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    fn from_env() -> Self {
        Config {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "gymgate".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "data/gymgate.db".into()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: parse_or("PORT", 3000),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into()),
            jwt_duration_minutes: parse_or("JWT_DURATION_MINUTES", 60),
            credential_ttl_seconds: parse_or("CREDENTIAL_TTL_SECONDS", 120),
            credential_ttl_min_seconds: parse_or("CREDENTIAL_TTL_MIN_SECONDS", 30),
            credential_ttl_max_seconds: parse_or("CREDENTIAL_TTL_MAX_SECONDS", 600),
            credential_purge_grace_seconds: parse_or("CREDENTIAL_PURGE_GRACE_SECONDS", 3600),
            credential_sweep_interval_seconds: parse_or("CREDENTIAL_SWEEP_INTERVAL_SECONDS", 300),
        }
    }

    /// Loads `.env` (if present) and initializes the singleton. Call once at
    /// process startup.
    pub fn init() -> &'static Self {
        dotenvy::dotenv().ok();
        CONFIG.get_or_init(Config::from_env)
    }

    /// Returns the global configuration, initializing it from the current
    /// environment on first access.
    pub fn get() -> &'static Self {
        CONFIG.get_or_init(Config::from_env)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
