use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::projection::manager::DEFAULT_PAGE_SIZE;
use crate::utils::RetryConfig;

/// Engine configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// PostgreSQL event store; `None` selects the in-memory store
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Page size used when rebuilding projections from the global stream
    pub stream_page_size: usize,
    /// Bounded retry applied by command handlers on concurrency conflicts
    pub conflict_retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            stream_page_size: DEFAULT_PAGE_SIZE,
            conflict_retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = Self::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            max_connections: parse_var("ES_MAX_CONNECTIONS", defaults.max_connections)?,
            stream_page_size: parse_var("ES_STREAM_PAGE_SIZE", defaults.stream_page_size)?,
            conflict_retry: defaults.conflict_retry.clone().with_max_attempts(parse_var(
                "ES_CONFLICT_RETRY_ATTEMPTS",
                defaults.conflict_retry.max_attempts,
            )?),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid number")),
        Err(_) => Ok(default),
    }
}
