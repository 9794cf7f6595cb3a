//! Course data model
//!
//! Raw API bodies are parsed once into [`CourseDetails`] and
//! [`HistoricGrades`]; the exported [`CourseRecord`] is derived from them by
//! pure merge functions. [`FilterCriteria`] decides which records are
//! exported.

mod details;
mod filter;
mod record;

pub use details::{
    confirmation_rate, CourseDetails, EntryRequirement, HistoricGrades, DEFAULT_A_LEVEL,
    DEFAULT_UCAS_TARIFF, UNKNOWN_DURATION,
};
pub use filter::{Criterion, FilterCriteria};
pub use record::{
    confirmation_rate_headers, confirmation_rate_row, ConfirmationRates, CourseField,
    CourseRecord, UCAS_ID_KEY,
};
