//! Configuration module for Course-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, with the environment variables the harvester has always honoured
//! layered on top.
//!
//! # Example
//!
//! ```no_run
//! use course_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Max retries: {}", config.fetcher.max_retries);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, CrawlerConfig, EndpointsConfig, FetcherConfig, OutputConfig,
    RateLimitConfig, RateLimitsConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, load_config, load_config_with_hash,
    load_default_config,
};
pub use validation::validate;
