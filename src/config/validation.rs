use crate::config::types::{Config, CrawlerConfig, EndpointsConfig, FetcherConfig, RateLimitsConfig};
use crate::crawler::{COURSE_CHANNEL, UNIVERSAL_CHANNEL};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_endpoints(&config.endpoints)?;
    validate_rate_limits(&config.rate_limits)?;

    if config.cache.current.trim().is_empty() {
        return Err(ConfigError::Validation(
            "cache.current cannot be empty".to_string(),
        ));
    }

    if config.user_agent.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.search_term.trim().is_empty() {
        return Err(ConfigError::Validation(
            "search_term cannot be empty".to_string(),
        ));
    }

    if config.predicted_grades.is_empty() {
        return Err(ConfigError::Validation(
            "predicted_grades must list at least one grade".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.timeout_ms == 0 || config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_endpoints(config: &EndpointsConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("catalogue_url", &config.catalogue_url),
        ("search_api_url", &config.search_api_url),
        ("historic_api_url", &config.historic_api_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                name, value
            )));
        }
    }

    Ok(())
}

fn validate_rate_limits(config: &RateLimitsConfig) -> Result<(), ConfigError> {
    for required in [UNIVERSAL_CHANNEL, COURSE_CHANNEL] {
        if !config.0.contains_key(required) {
            return Err(ConfigError::Validation(format!(
                "rate limit channel '{}' must be configured",
                required
            )));
        }
    }

    for (name, limit) in &config.0 {
        if limit.requests < 1 {
            return Err(ConfigError::Validation(format!(
                "rate limit channel '{}' must allow at least one request",
                name
            )));
        }
    }

    Ok(())
}
