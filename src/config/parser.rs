use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are applied after parsing and before validation.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use course_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Searching for: {}", config.crawler.search_term);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    finish(config)
}

/// Builds a configuration from defaults and environment variables only
pub fn load_default_config() -> Result<Config, ConfigError> {
    finish(Config::default())
}

fn finish(mut config: Config) -> Result<Config, ConfigError> {
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Applies the recognised environment variables on top of a parsed config
///
/// | Variable | Field |
/// |----------|-------|
/// | `OUTPUT` | `cache.output-root` |
/// | `COURSE` | `crawler.search-term` |
/// | `DESTINATION` | `crawler.destination` |
/// | `PREDICTED_GRADES` | `crawler.predicted-grades` (comma separated) |
/// | `UCAS_URL` | `endpoints.catalogue-url` |
/// | `STUDY_YEAR` | `crawler.study-year` |
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(output) = lookup("OUTPUT") {
        config.cache.output_root = output.into();
    }
    if let Some(course) = lookup("COURSE") {
        config.crawler.search_term = course;
    }
    if let Some(destination) = lookup("DESTINATION") {
        config.crawler.destination = destination;
    }
    if let Some(grades) = lookup("PREDICTED_GRADES") {
        config.crawler.predicted_grades = grades
            .split(',')
            .map(|grade| grade.trim().to_string())
            .filter(|grade| !grade.is_empty())
            .collect();
    }
    if let Some(url) = lookup("UCAS_URL") {
        config.endpoints.catalogue_url = url;
    }
    if let Some(year) = lookup("STUDY_YEAR") {
        config.crawler.study_year = year.trim().parse().map_err(|_| ConfigError::Env {
            name: "STUDY_YEAR".to_string(),
            value: year.clone(),
        })?;
    }
    Ok(())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
