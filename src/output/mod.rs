//! Output module for exports and run reports
//!
//! This module handles:
//! - Writing merged course records and confirmation rates as CSV
//! - Printing crawl statistics and cached course listings

mod csv;
pub mod stats;

pub use self::csv::{export, ExportPaths};
pub use stats::{cache_hit_rate, print_locations, print_statistics};
