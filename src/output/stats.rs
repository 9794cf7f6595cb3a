//! Run statistics reporting
//!
//! This module prints the counters of a finished run for the operator.

use crate::crawler::{CrawlSummary, FetchStats};
use crate::storage::CacheLocation;

/// Share of lookups served from the cache, as a percentage
pub fn cache_hit_rate(summary: &CrawlSummary) -> f64 {
    let total = summary.documents_from_cache + summary.documents_fetched;
    if total > 0 {
        (summary.documents_from_cache as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints crawl and fetch counters to stdout in a formatted manner
pub fn print_statistics(summary: &CrawlSummary, fetch: &FetchStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Catalogue:");
    println!("  Pages read: {}", summary.pages());
    println!("    fetched: {}", summary.pages_fetched);
    println!("    from cache: {}", summary.pages_from_cache);
    println!("  Courses processed: {}", summary.entities_processed);
    println!();

    println!("Documents:");
    println!("  From cache: {}", summary.documents_from_cache);
    println!("  Fetched: {}", summary.documents_fetched);
    println!("  Unavailable this run: {}", summary.documents_unavailable);
    println!("  Cache hit rate: {:.1}%", cache_hit_rate(summary));
    println!();

    println!("Requests:");
    println!("  Attempts: {}", fetch.attempts);
    println!("  Retries: {}", fetch.retries);
    println!("  Success: {}", fetch.successes);
    println!("  Not found: {}", fetch.not_found);
    println!("  Other status: {}", fetch.other_errors);

    if fetch.terminal_failures > 0 {
        println!("  Terminal failures: {}", fetch.terminal_failures);
    }
}

/// Prints every cached entity location, one per line
pub fn print_locations(locations: &[CacheLocation]) {
    for location in locations {
        println!("{}", location);
    }
    println!("\n{} cached courses", locations.len());
}
