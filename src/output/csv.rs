//! CSV exports of rebuilt course data

use crate::config::OutputConfig;
use crate::course::{confirmation_rate_headers, confirmation_rate_row, CourseField};
use crate::crawler::Rebuild;
use crate::storage::{CacheStore, StorageResult};
use std::path::PathBuf;

/// Files written by [`export`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportPaths {
    pub courses: PathBuf,
    /// Absent when no course survived the filter
    pub confirmation_rates: Option<PathBuf>,
}

/// Writes the course and confirmation-rate exports at the cache root
///
/// The course export always has a header row. The confirmation-rate export
/// has `ucas_id` followed by every grade seen, highest column name first, and
/// is skipped when there are no rows.
pub fn export(store: &CacheStore, output: &OutputConfig, rebuild: &Rebuild) -> StorageResult<ExportPaths> {
    let courses = store.write_csv(
        &output.courses_name,
        &CourseField::headers(),
        rebuild.courses.iter().map(|course| course.to_row()),
    )?;

    let confirmation_rates = if rebuild.confirmation_rates.is_empty() {
        None
    } else {
        let headers = confirmation_rate_headers(&rebuild.confirmation_rates);
        let rows = rebuild
            .confirmation_rates
            .iter()
            .map(|rates| confirmation_rate_row(rates, &headers));
        Some(store.write_csv(&output.confirmation_rates_name, &headers, rows)?)
    };

    Ok(ExportPaths {
        courses,
        confirmation_rates,
    })
}
