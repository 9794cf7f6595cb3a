//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with proper user agent strings
//! - GET and POST requests with bounded retries on transient failures
//! - Reconnecting after a transient failure
//! - Status classification into a [`FetchOutcome`]
//! - Recording URIs that exhaust every attempt in an error ledger
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 200 | Immediate → Success |
//! | HTTP 404 | Immediate → NotFound |
//! | Any other status | Immediate → OtherError |
//! | Connect/read timeout | Reconnect, wait, retry up to `max_retries` |
//! | Connection reset mid-stream | Reconnect, wait, retry up to `max_retries` |
//! | Anything else (refused, bad URL) | Immediate → `FetchError::Transport` |
//! | Retries exhausted | Ledger entry → `FetchError::Exhausted` |

use crate::config::{FetcherConfig, UserAgentConfig};
use crate::crawler::rate_limit::RateLimiter;
use crate::{FetchError, FetchResult, Record};
use reqwest::{Client, StatusCode};
use std::error::Error as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Longest body excerpt kept on an [`FetchOutcome::OtherError`]
pub const EXCERPT_LEN: usize = 79;

/// Classified result of one completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTTP 200 with the response body
    Success(Vec<u8>),

    /// HTTP 404: the entity does not exist
    NotFound,

    /// Any other status: the entity is unavailable this run
    OtherError {
        /// The HTTP status code
        status: u16,
        /// Whitespace-collapsed start of the response body
        excerpt: String,
    },
}

impl FetchOutcome {
    /// Classifies a status code and body
    pub fn classify(status: StatusCode, body: Vec<u8>) -> Self {
        match status {
            StatusCode::OK => Self::Success(body),
            StatusCode::NOT_FOUND => Self::NotFound,
            other => Self::OtherError {
                status: other.as_u16(),
                excerpt: excerpt(&String::from_utf8_lossy(&body)),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the body of a successful outcome
    pub fn into_body(self) -> Option<Vec<u8>> {
        match self {
            Self::Success(body) => Some(body),
            _ => None,
        }
    }
}

/// Collapses whitespace runs to one space and keeps the first [`EXCERPT_LEN`] characters
pub fn excerpt(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len().min(EXCERPT_LEN * 4));
    let mut in_whitespace = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                collapsed.push(' ');
            }
            in_whitespace = true;
        } else {
            collapsed.push(c);
            in_whitespace = false;
        }
    }

    collapsed.chars().take(EXCERPT_LEN).collect()
}

/// Decodes a JSON object body
///
/// A body that is not valid JSON, or is JSON but not an object, yields an
/// empty record. The failure is logged and never propagated.
pub fn decode_record(uri: &str, body: &[u8]) -> Record {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(record)) => record,
        Ok(other) => {
            tracing::warn!(uri, "Expected a JSON object, got {}", json_kind(&other));
            Record::new()
        }
        Err(e) => {
            tracing::warn!(uri, "Error decoding JSON response: {}", e);
            Record::new()
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Counters kept across every request made by one client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// HTTP attempts issued, retries included
    pub attempts: u64,

    /// Backoff pauses taken after transient failures
    pub retries: u64,

    pub successes: u64,
    pub not_found: u64,
    pub other_errors: u64,

    /// Logical requests that exhausted every attempt
    pub terminal_failures: u64,
}

impl FetchStats {
    fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Success(_) => self.successes += 1,
            FetchOutcome::NotFound => self.not_found += 1,
            FetchOutcome::OtherError { .. } => self.other_errors += 1,
        }
    }
}

/// Append-only file of URIs that could not be fetched
#[derive(Debug, Clone)]
pub struct ErrorLedger {
    path: PathBuf,
}

impl ErrorLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `uri` as one line, creating the parent directory if needed
    pub fn record(&self, uri: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", uri)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `config` - Timeouts applied to every request
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use course_harvest::config::{FetcherConfig, UserAgentConfig};
/// use course_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    config: &FetcherConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Request shape for one logical fetch
enum HttpVerb<'a> {
    Get,
    Post {
        body: Vec<u8>,
        headers: &'a [(&'a str, &'a str)],
    },
}

/// Retrying HTTP client with rate limiting and a failure ledger
///
/// One instance owns the connection pool and every rate-limit channel for the
/// whole process. Methods take `&mut self`, so only one request is ever in
/// flight.
pub struct FetchClient {
    client: Client,
    config: FetcherConfig,
    user_agent: UserAgentConfig,
    rate_limiter: RateLimiter,
    ledger: ErrorLedger,
    stats: FetchStats,
}

impl FetchClient {
    /// Creates a client
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(
        config: FetcherConfig,
        user_agent: UserAgentConfig,
        rate_limiter: RateLimiter,
    ) -> FetchResult<Self> {
        let client = build_http_client(&user_agent, &config).map_err(FetchError::ClientBuild)?;
        let ledger = ErrorLedger::new(config.error_log_path.clone());

        Ok(Self {
            client,
            config,
            user_agent,
            rate_limiter,
            ledger,
            stats: FetchStats::default(),
        })
    }

    /// GET `uri`
    pub async fn fetch(&mut self, uri: &str) -> FetchResult<FetchOutcome> {
        self.request(HttpVerb::Get, uri).await
    }

    /// POST a JSON `payload` to `uri` with extra `headers`
    pub async fn post(
        &mut self,
        uri: &str,
        payload: &serde_json::Value,
        headers: &[(&str, &str)],
    ) -> FetchResult<FetchOutcome> {
        let body = serde_json::to_vec(payload).map_err(|source| FetchError::Payload {
            uri: uri.to_string(),
            source,
        })?;
        self.request(HttpVerb::Post { body, headers }, uri).await
    }

    /// GET `uri` after acquiring a slot on `channel`
    pub async fn fetch_with_rate_limit(
        &mut self,
        uri: &str,
        channel: &str,
    ) -> FetchResult<FetchOutcome> {
        self.rate_limiter.acquire(channel).await?;
        self.fetch(uri).await
    }

    /// POST `payload` to `uri` after acquiring a slot on `channel`
    pub async fn post_with_rate_limit(
        &mut self,
        uri: &str,
        payload: &serde_json::Value,
        headers: &[(&str, &str)],
        channel: &str,
    ) -> FetchResult<FetchOutcome> {
        self.rate_limiter.acquire(channel).await?;
        self.post(uri, payload, headers).await
    }

    /// Rate-limited GET decoding a JSON object
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - HTTP 200; `record` is empty if the body did not decode
    /// * `Ok(None)` - Any other classified status
    /// * `Err(FetchError)` - Terminal failure
    pub async fn fetch_json_with_rate_limit(
        &mut self,
        uri: &str,
        channel: &str,
    ) -> FetchResult<Option<Record>> {
        let outcome = self.fetch_with_rate_limit(uri, channel).await?;
        Ok(outcome.into_body().map(|body| decode_record(uri, &body)))
    }

    /// Rate-limited POST decoding a JSON object, see [`Self::fetch_json_with_rate_limit`]
    pub async fn post_json_with_rate_limit(
        &mut self,
        uri: &str,
        payload: &serde_json::Value,
        headers: &[(&str, &str)],
        channel: &str,
    ) -> FetchResult<Option<Record>> {
        let outcome = self
            .post_with_rate_limit(uri, payload, headers, channel)
            .await?;
        Ok(outcome.into_body().map(|body| decode_record(uri, &body)))
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn ledger(&self) -> &ErrorLedger {
        &self.ledger
    }

    /// Shuts the client down, dropping its connection pool
    pub fn close(self) {
        tracing::info!(
            attempts = self.stats.attempts,
            retries = self.stats.retries,
            successes = self.stats.successes,
            not_found = self.stats.not_found,
            other_errors = self.stats.other_errors,
            terminal_failures = self.stats.terminal_failures,
            "Fetch client closed"
        );
    }

    async fn request(&mut self, verb: HttpVerb<'_>, uri: &str) -> FetchResult<FetchOutcome> {
        let max_retries = self.config.max_retries;

        for attempt in 1..=max_retries {
            self.stats.attempts += 1;
            tracing::debug!(uri, attempt, max_retries, "Sending request");

            match self.execute(&verb, uri).await {
                Ok((status, body)) => {
                    let outcome = FetchOutcome::classify(status, body);
                    self.stats.record(&outcome);
                    log_outcome(uri, &outcome);
                    return Ok(outcome);
                }
                Err(e) if is_transient(&e) => {
                    tracing::warn!(
                        uri,
                        attempt,
                        max_retries,
                        "Attempt {}/{} failed for {}: {}",
                        attempt,
                        max_retries,
                        uri,
                        e
                    );

                    if attempt < max_retries {
                        self.stats.retries += 1;
                        tokio::time::sleep(self.config.retry_delay()).await;
                        self.reconnect()?;
                    }
                }
                Err(e) => {
                    tracing::error!(uri, "Request failed: {}", e);
                    return Err(FetchError::Transport {
                        uri: uri.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(self.handle_failure(uri))
    }

    async fn execute(
        &self,
        verb: &HttpVerb<'_>,
        uri: &str,
    ) -> Result<(StatusCode, Vec<u8>), reqwest::Error> {
        let builder = match verb {
            HttpVerb::Get => self.client.get(uri),
            HttpVerb::Post { body, headers } => {
                let mut builder = self.client.post(uri).body(body.clone());
                for (name, value) in headers.iter() {
                    builder = builder.header(*name, *value);
                }
                builder
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        // Reading the body is part of the attempt: a reset mid-stream is retried
        let body = response.bytes().await?;

        Ok((status, body.to_vec()))
    }

    /// Drops the connection pool and builds a fresh one
    fn reconnect(&mut self) -> FetchResult<()> {
        self.client =
            build_http_client(&self.user_agent, &self.config).map_err(FetchError::ClientBuild)?;
        Ok(())
    }

    fn handle_failure(&mut self, uri: &str) -> FetchError {
        self.stats.terminal_failures += 1;

        if let Err(e) = self.ledger.record(uri) {
            tracing::error!(
                uri,
                "Failed to record {} in error ledger {}: {}",
                uri,
                self.ledger.path().display(),
                e
            );
        }

        let error = FetchError::Exhausted {
            uri: uri.to_string(),
            attempts: self.config.max_retries,
        };
        tracing::error!(uri, "{}", error);
        error
    }
}

fn log_outcome(uri: &str, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Success(body) => {
            tracing::info!(uri, bytes = body.len(), "Fetched");
        }
        FetchOutcome::NotFound => {
            tracing::info!(uri, "Doesn't exist (404)");
        }
        FetchOutcome::OtherError { status, excerpt } => {
            tracing::warn!(uri, status, "HTTP {}: {}", status, excerpt);
        }
    }
}

/// Timeouts and connections dropped mid-exchange are worth another attempt
fn is_transient(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_body() {
        return true;
    }

    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
            ) {
                return true;
            }
        }
        // hyper reports a peer hanging up before the response completed this way
        if cause
            .to_string()
            .contains("connection closed before message completed")
        {
            return true;
        }
        source = cause.source();
    }

    false
}
