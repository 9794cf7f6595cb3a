//! Parsed API payloads
//!
//! Detail and historic-grade bodies are decoded once into immutable
//! structures. Missing or oddly shaped fields fall back to defaults instead of
//! failing, since upstream payloads are trusted but not always complete.

use crate::Record;
use serde_json::Value;

/// Entry requirement shown when the course lists no A level requirement
pub const DEFAULT_A_LEVEL: &str = "No data";

/// Entry requirement shown when the course does not accept UCAS tariff points
pub const DEFAULT_UCAS_TARIFF: &str = "Not accepted";

/// Duration shown when the course option gives none
pub const UNKNOWN_DURATION: &str = "Unknown";

/// Qualification name of the A level entry requirement
const A_LEVEL_NAME: &str = "A level";

/// Qualification name of the UCAS tariff entry requirement
const UCAS_TARIFF_NAME: &str = "UCAS Tariff";

/// One entry requirement summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRequirement {
    /// Headline offer, e.g. `AAA` or `120`
    pub offer: String,
    /// Free-text description of the requirement
    pub requirements: String,
}

impl EntryRequirement {
    fn with_offer(offer: &str) -> Self {
        Self {
            offer: offer.to_string(),
            requirements: String::new(),
        }
    }

    fn from_summary(summary: &Value, default_offer: &str) -> Self {
        let offer = text(summary.get("offer"));
        Self {
            offer: if offer.is_empty() {
                default_offer.to_string()
            } else {
                offer
            },
            requirements: text(summary.get("requirements")),
        }
    }
}

/// Course details as returned by the search API
///
/// Only the first course option is considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseDetails {
    pub id: String,
    pub course_code: String,
    pub title: String,
    pub provider: String,
    pub provider_sort: String,
    pub institution_code: String,
    pub location: String,
    pub provider_url: String,
    pub qualification: String,
    pub study_mode: String,
    pub duration: String,
    pub a_level: EntryRequirement,
    pub ucas_tariff: EntryRequirement,
}

impl CourseDetails {
    /// Parses a detail API body
    ///
    /// Returns `None` when the body has no `course` object, which is how the
    /// API answers for unknown ids.
    pub fn from_json(body: &Record) -> Option<Self> {
        let course = body.get("course").filter(|c| c.is_object())?;
        let provider = course.get("provider").unwrap_or(&Value::Null);
        let option = course
            .get("options")
            .and_then(Value::as_array)
            .and_then(|options| options.first())
            .unwrap_or(&Value::Null);

        let mut a_level = EntryRequirement::with_offer(DEFAULT_A_LEVEL);
        let mut ucas_tariff = EntryRequirement::with_offer(DEFAULT_UCAS_TARIFF);

        let qualifications = option
            .pointer("/academicEntryRequirements/qualifications")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for qualification in qualifications {
            let summary = qualification.get("summary").unwrap_or(&Value::Null);
            match qualification.get("qualificationName").and_then(Value::as_str) {
                Some(A_LEVEL_NAME) => {
                    a_level = EntryRequirement::from_summary(summary, DEFAULT_A_LEVEL)
                }
                Some(UCAS_TARIFF_NAME) => {
                    ucas_tariff = EntryRequirement::from_summary(summary, DEFAULT_UCAS_TARIFF)
                }
                _ => {}
            }
        }

        Some(Self {
            id: text(course.get("id")),
            course_code: text(course.get("applicationCode")),
            title: text(course.get("courseTitle")),
            provider: text(provider.get("name")),
            provider_sort: text(provider.get("providerSort")),
            institution_code: text(provider.get("institutionCode")),
            location: text(option.pointer("/location/name")),
            provider_url: text(option.get("providerCourseUrl")),
            qualification: text(option.pointer("/outcomeQualification/caption")),
            study_mode: text(option.pointer("/studyMode/caption")),
            duration: duration(option.get("duration")),
            a_level,
            ucas_tariff,
        })
    }
}

/// Aggregate grades from the historic-grades API
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoricGrades {
    pub most_common_grade: String,
    pub minimum_grade: String,
    pub maximum_grade: String,
}

impl HistoricGrades {
    /// Parses the first entry of the body's `results` array
    pub fn from_json(body: &Record) -> Option<Self> {
        let result = first_result(body)?;

        Some(Self {
            most_common_grade: text(result.get("mostCommonGrade")),
            minimum_grade: text(result.get("minimumGrade")),
            maximum_grade: text(result.get("maximumGrade")),
        })
    }
}

/// Extracts the confirmation rate from a confirmation-rate API body
///
/// An empty result list means no rate is published for that grade, which is
/// stored as an empty string.
pub fn confirmation_rate(body: &Record) -> String {
    first_result(body)
        .map(|result| text(result.get("confirmationRate")))
        .unwrap_or_default()
}

fn first_result(body: &Record) -> Option<&Value> {
    body.get("results")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
}

fn duration(value: Option<&Value>) -> String {
    let Some(duration) = value.filter(|d| d.is_object()) else {
        return UNKNOWN_DURATION.to_string();
    };

    let quantity = duration.get("quantity").and_then(Value::as_f64);
    let caption = text(duration.pointer("/durationType/caption"));

    match quantity {
        Some(quantity) => format!("{} {}", quantity.trunc() as i64, caption)
            .trim_end()
            .to_string(),
        None => UNKNOWN_DURATION.to_string(),
    }
}

/// Renders a scalar JSON value as text; absent, null and structured values are empty
fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}
