use chrono::Datelike;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Course-Harvest
///
/// Every section has defaults, so an empty file (or no file at all) yields a
/// usable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetcher: FetcherConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub endpoints: EndpointsConfig,
    pub cache: CacheConfig,
    #[serde(rename = "rate-limits")]
    pub rate_limits: RateLimitsConfig,
    pub output: OutputConfig,
}

/// What to search for and which statistics to collect
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Catalogue search term
    pub search_term: String,

    /// Course type passed to the catalogue and detail API
    pub destination: String,

    /// Academic year the crawl targets
    pub study_year: i32,

    /// Predicted grades to request confirmation rates for
    pub predicted_grades: Vec<String>,

    /// Re-fetch catalogue pages even when a cached copy exists
    pub refresh_catalogue: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            search_term: "Computer Science".to_string(),
            destination: "Undergraduate".to_string(),
            study_year: chrono::Local::now().year() + 1,
            predicted_grades: vec!["ABC".to_string(), "DEF".to_string()],
            refresh_catalogue: false,
        }
    }
}

/// Retry and timeout behavior of the fetch client
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Attempts per logical request before giving up
    pub max_retries: u32,

    /// Total request timeout (milliseconds)
    pub timeout_ms: u64,

    /// Connection establishment timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Fixed pause between a transient failure and the next attempt (milliseconds)
    pub retry_delay_ms: u64,

    /// Append-only ledger of URIs that exhausted every attempt
    pub error_log_path: PathBuf,
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            retry_delay_ms: 1_000,
            error_log_path: PathBuf::from("tmp/errors.txt"),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the harvester
    pub crawler_name: String,

    /// Version of the harvester
    pub crawler_version: String,

    /// URL with information about the harvester
    pub contact_url: Option<String>,

    /// Email address for harvester-related contact
    pub contact_email: Option<String>,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        let base = format!("{}/{}", self.crawler_name, self.crawler_version);
        match (&self.contact_url, &self.contact_email) {
            (Some(url), Some(email)) => format!("{} (+{}; {})", base, url, email),
            (Some(url), None) => format!("{} (+{})", base, url),
            (None, Some(email)) => format!("{} ({})", base, email),
            (None, None) => base,
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "course-harvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
            contact_email: None,
        }
    }
}

/// Base URLs of the catalogue and the statistics APIs
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EndpointsConfig {
    pub catalogue_url: String,
    pub search_api_url: String,
    pub historic_api_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            catalogue_url: "https://digital.ucas.com".to_string(),
            search_api_url: "https://services.ucas.com".to_string(),
            historic_api_url: "https://services.ucas.com".to_string(),
        }
    }
}

/// On-disk cache layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Directory holding the current cache and any prior-version caches
    pub output_root: PathBuf,

    /// Name of the current cache directory under `output_root`
    pub current: String,

    /// Prior-version cache directories consulted on a read miss, in order
    pub fallbacks: Vec<String>,
}

impl CacheConfig {
    pub fn current_root(&self) -> PathBuf {
        self.output_root.join(&self.current)
    }

    pub fn fallback_roots(&self) -> Vec<PathBuf> {
        self.fallbacks
            .iter()
            .map(|name| self.output_root.join(name))
            .collect()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("tmp"),
            current: "data".to_string(),
            fallbacks: vec!["v1.1".to_string()],
        }
    }
}

/// Budget of one named rate-limit channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed before the window sleep kicks in
    pub requests: u32,

    /// Length of the window sleep (seconds)
    pub seconds: u64,
}

/// Named rate-limit channels
///
/// Channels declared in the file are merged over the defaults, so declaring
/// one channel keeps the others.
#[derive(Debug, Clone)]
pub struct RateLimitsConfig(pub BTreeMap<String, RateLimitConfig>);

impl<'de> Deserialize<'de> for RateLimitsConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let declared = BTreeMap::<String, RateLimitConfig>::deserialize(deserializer)?;
        let mut limits = Self::default();
        limits.0.extend(declared);
        Ok(limits)
    }
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        let mut channels = BTreeMap::new();
        channels.insert(
            "universal".to_string(),
            RateLimitConfig {
                requests: 10,
                seconds: 60,
            },
        );
        channels.insert(
            "course".to_string(),
            RateLimitConfig {
                requests: 10,
                seconds: 60,
            },
        );
        Self(channels)
    }
}

/// Export configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Name (without extension) of the merged course export
    pub courses_name: String,

    /// Name (without extension) of the confirmation rate export
    pub confirmation_rates_name: String,

    /// Structured cache document holding the course filter criteria
    pub filter_criteria_document: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            courses_name: "courses".to_string(),
            confirmation_rates_name: "confirmation-rates".to_string(),
            filter_criteria_document: "course_filter_criteria".to_string(),
        }
    }
}
