//! Crawler module for catalogue harvesting
//!
//! This module contains the network side of the harvester:
//! - Named-channel rate limiting
//! - HTTP fetching with retries, outcome classification and a failure ledger
//! - Catalogue page parsing and request construction
//! - Cache-first crawl orchestration

mod coordinator;
mod endpoints;
mod fetcher;
mod parser;
mod rate_limit;

pub use coordinator::{
    course_ids_document, entity_location, not_found_record, search_location, CrawlOrchestrator, CrawlReport,
    CrawlSummary, ProcessedEntity, Rebuild, CONFIRMATION_RATES_DOCUMENT, COURSE_INDEX_DOCUMENT,
    DETAIL_DOCUMENT, HISTORIC_DOCUMENT, PROVIDERS_SEGMENT, SEARCH_SEGMENT,
};
pub use endpoints::{
    confirmation_rate_payload, Endpoints, CONFIRMATION_RATE_HEADERS, QUALIFICATION_TYPE,
};
pub use fetcher::{
    build_http_client, decode_record, excerpt, ErrorLedger, FetchClient, FetchOutcome,
    FetchStats, EXCERPT_LEN,
};
pub use parser::{parse_catalogue_page, parse_course_id, EntitySummary};
pub use rate_limit::{RateLimitChannel, RateLimiter, COURSE_CHANNEL, UNIVERSAL_CHANNEL};
