use std::{net::SocketAddr, time::Duration};

use anyhow::Context;

use crate::{
    cache::{DEFAULT_TIMEOUT, DEFAULT_TTL},
    kv::DEFAULT_MEMORY_CAPACITY,
    service::DEFAULT_STORE_TIMEOUT,
};

/// Log output selected by `LOGGER`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    #[default]
    Development,
    /// JSON lines.
    Production,
    /// No output.
    Test,
}

impl LogFormat {
    /// Case-insensitive; unknown values fall back to development output.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("production") {
            LogFormat::Production
        } else if raw.eq_ignore_ascii_case("test") {
            LogFormat::Test
        } else {
            LogFormat::Development
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub auto_migrate: bool,
    /// No URL means the process-local memory cache.
    pub redis_url: Option<String>,
    pub memory_cache_capacity: u64,
    pub cache_key_prefix: String,
    pub cache_ttl: Duration,
    pub cache_timeout: Duration,
    pub store_timeout: Duration,
    pub logger: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://sakila.db?mode=rwc".to_string());

        let auto_migrate = std::env::var("AUTO_MIGRATE")
            .ok()
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let redis_url = std::env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty());
        let memory_cache_capacity: u64 = std::env::var("MEMORY_CACHE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MEMORY_CAPACITY);
        let cache_key_prefix = std::env::var("CACHE_KEY_PREFIX").unwrap_or_default();

        let cache_ttl = std::env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(DEFAULT_TTL, Duration::from_secs);
        let cache_timeout = std::env::var("CACHE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(DEFAULT_TIMEOUT, Duration::from_millis);
        let store_timeout = std::env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(DEFAULT_STORE_TIMEOUT, Duration::from_millis);

        let logger = std::env::var("LOGGER").map(|s| LogFormat::parse(&s)).unwrap_or_default();

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            auto_migrate,
            redis_url,
            memory_cache_capacity,
            cache_key_prefix,
            cache_ttl,
            cache_timeout,
            store_timeout,
            logger,
        })
    }
}
