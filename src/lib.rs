//! Course-Harvest: a resumable course catalogue harvester
//!
//! This crate walks a paginated course catalogue, pulls per-course details and
//! historic grade statistics from the companion APIs, and keeps everything in
//! an on-disk cache so repeated runs only fetch what is still missing.

pub mod config;
pub mod course;
pub mod crawler;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Course-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Rate limit error: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid value for environment variable {name}: {value}")]
    Env { name: String, value: String },
}

/// Errors raised by the fetch client
///
/// Non-success HTTP statuses are not errors; they are classified into a
/// [`crawler::FetchOutcome`]. Only exhausted retries and non-retryable
/// transport failures end up here.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to fetch {uri} after {attempts} attempts")]
    Exhausted { uri: String, attempts: u32 },

    #[error("Transport error for {uri}: {message}")]
    Transport { uri: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Failed to encode request payload for {uri}: {source}")]
    Payload {
        uri: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

/// Rate limiter errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit channel '{0}' is not configured")]
    UnknownChannel(String),
}

/// A JSON object, the shape of every structured document and API body
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Result type alias for Course-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use course::{CourseField, CourseRecord};
pub use crawler::{CrawlOrchestrator, FetchClient, FetchOutcome, RateLimiter};
pub use storage::{CacheLocation, CacheStore, Document};
