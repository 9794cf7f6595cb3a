//! Include/exclude course filter
//!
//! Criteria are kept as a structured document in the cache root:
//!
//! ```json
//! {
//!     "criteria": [
//!         {"include": {"study_mode": ["Full-time"]}},
//!         {"exclude": {"minimum_grade": ["A*A*A*"]}}
//!     ]
//! }
//! ```
//!
//! A course is excluded when any `include` field's value is not among the
//! listed values, or any `exclude` field's value is among them. Unknown field
//! names never match a value.

use crate::course::{CourseField, CourseRecord};
use crate::storage::{CacheLocation, CacheStore};
use crate::Record;
use serde::Deserialize;
use std::collections::BTreeMap;

/// One criterion; either side may be absent
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Criterion {
    pub include: BTreeMap<String, Vec<String>>,
    pub exclude: BTreeMap<String, Vec<String>>,
}

/// Ordered filter criteria; empty means every course is kept
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub criteria: Vec<Criterion>,
}

impl FilterCriteria {
    /// Decodes criteria from a structured document
    pub fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(record.clone()))
    }

    /// Loads the criteria document from the cache root
    ///
    /// An absent or malformed document yields no criteria.
    pub fn load(store: &CacheStore, name: &str) -> Self {
        let Some(record) = store.read(&CacheLocation::root(), name, false) else {
            tracing::debug!(name, "No course filter criteria found");
            return Self::default();
        };

        match Self::from_record(&record) {
            Ok(criteria) => {
                tracing::info!(name, criteria = criteria.criteria.len(), "Loaded course filter criteria");
                criteria
            }
            Err(e) => {
                tracing::warn!(name, "Ignoring malformed course filter criteria: {}", e);
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Whether the course should be left out of the export
    pub fn excludes(&self, course: &CourseRecord) -> bool {
        self.criteria.iter().any(|criterion| {
            excluded_by_include(course, &criterion.include)
                || excluded_by_exclude(course, &criterion.exclude)
        })
    }
}

fn field_value<'a>(course: &'a CourseRecord, name: &str) -> Option<&'a str> {
    CourseField::from_name(name).map(|field| course.get(field))
}

fn excluded_by_include(course: &CourseRecord, include: &BTreeMap<String, Vec<String>>) -> bool {
    include.iter().any(|(name, allowed)| {
        let value = field_value(course, name);
        let kept = value.is_some_and(|value| allowed.iter().any(|a| a == value));
        if !kept {
            tracing::debug!(
                course = %course.title,
                field = %name,
                value = value.unwrap_or_default(),
                "Excluded: value not in include list"
            );
        }
        !kept
    })
}

fn excluded_by_exclude(course: &CourseRecord, exclude: &BTreeMap<String, Vec<String>>) -> bool {
    exclude.iter().any(|(name, rejected)| {
        let Some(value) = field_value(course, name) else {
            return false;
        };
        let hit = rejected.iter().any(|r| r == value);
        if hit {
            tracing::debug!(
                course = %course.title,
                field = %name,
                value,
                "Excluded: value in exclude list"
            );
        }
        hit
    })
}
