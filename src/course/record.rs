//! Merged course records and their field registry

use crate::course::details::{CourseDetails, HistoricGrades, DEFAULT_A_LEVEL, DEFAULT_UCAS_TARIFF};
use crate::Record;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One column of a [`CourseRecord`]
///
/// The snake_case name is both the CSV header and the key used by filter
/// criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CourseField {
    UcasId,
    Provider,
    Title,
    Qualification,
    StudyMode,
    Duration,
    ALevelText,
    ALevel,
    UcasTariffText,
    UcasTariff,
    MostCommonGrade,
    MinimumGrade,
    MaximumGrade,
    Location,
    InstitutionCode,
    CourseCode,
    ProviderSort,
    ProviderUrl,
}

impl CourseField {
    /// Every field in column order
    pub const ALL: [CourseField; 18] = [
        Self::UcasId,
        Self::Provider,
        Self::Title,
        Self::Qualification,
        Self::StudyMode,
        Self::Duration,
        Self::ALevelText,
        Self::ALevel,
        Self::UcasTariffText,
        Self::UcasTariff,
        Self::MostCommonGrade,
        Self::MinimumGrade,
        Self::MaximumGrade,
        Self::Location,
        Self::InstitutionCode,
        Self::CourseCode,
        Self::ProviderSort,
        Self::ProviderUrl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::UcasId => "ucas_id",
            Self::Provider => "provider",
            Self::Title => "title",
            Self::Qualification => "qualification",
            Self::StudyMode => "study_mode",
            Self::Duration => "duration",
            Self::ALevelText => "a_level_text",
            Self::ALevel => "a_level",
            Self::UcasTariffText => "ucas_tariff_text",
            Self::UcasTariff => "ucas_tariff",
            Self::MostCommonGrade => "most_common_grade",
            Self::MinimumGrade => "minimum_grade",
            Self::MaximumGrade => "maximum_grade",
            Self::Location => "location",
            Self::InstitutionCode => "institution_code",
            Self::CourseCode => "course_code",
            Self::ProviderSort => "provider_sort",
            Self::ProviderUrl => "provider_url",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.name() == name)
    }

    /// Column headers in order
    pub fn headers() -> Vec<&'static str> {
        Self::ALL.iter().map(CourseField::name).collect()
    }
}

impl fmt::Display for CourseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CourseField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("Unknown course field: {}", s))
    }
}

/// One output row: course details merged with historic grades
///
/// Any source may be missing; its fields then keep their defaults, and the
/// record is still emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseRecord {
    pub ucas_id: String,
    pub provider: String,
    pub title: String,
    pub qualification: String,
    pub study_mode: String,
    pub duration: String,
    pub a_level_text: String,
    pub a_level: String,
    pub ucas_tariff_text: String,
    pub ucas_tariff: String,
    pub most_common_grade: String,
    pub minimum_grade: String,
    pub maximum_grade: String,
    pub location: String,
    pub institution_code: String,
    pub course_code: String,
    pub provider_sort: String,
    pub provider_url: String,
}

impl Default for CourseRecord {
    fn default() -> Self {
        Self {
            ucas_id: String::new(),
            provider: String::new(),
            title: String::new(),
            qualification: String::new(),
            study_mode: String::new(),
            duration: String::new(),
            a_level_text: String::new(),
            a_level: DEFAULT_A_LEVEL.to_string(),
            ucas_tariff_text: String::new(),
            ucas_tariff: DEFAULT_UCAS_TARIFF.to_string(),
            most_common_grade: String::new(),
            minimum_grade: String::new(),
            maximum_grade: String::new(),
            location: String::new(),
            institution_code: String::new(),
            course_code: String::new(),
            provider_sort: String::new(),
            provider_url: String::new(),
        }
    }
}

impl CourseRecord {
    /// Builds a record from whichever sources are available
    pub fn merge(details: Option<&CourseDetails>, historic: Option<&HistoricGrades>) -> Self {
        let record = Self::default();
        let record = match details {
            Some(details) => record.with_details(details),
            None => record,
        };
        match historic {
            Some(historic) => record.with_historic(historic),
            None => record,
        }
    }

    pub fn with_details(self, details: &CourseDetails) -> Self {
        Self {
            ucas_id: details.id.clone(),
            provider: details.provider.clone(),
            title: details.title.clone(),
            qualification: details.qualification.clone(),
            study_mode: details.study_mode.clone(),
            duration: details.duration.clone(),
            a_level_text: details.a_level.requirements.clone(),
            a_level: details.a_level.offer.clone(),
            ucas_tariff_text: details.ucas_tariff.requirements.clone(),
            ucas_tariff: details.ucas_tariff.offer.clone(),
            location: details.location.clone(),
            institution_code: details.institution_code.clone(),
            course_code: details.course_code.clone(),
            provider_sort: details.provider_sort.clone(),
            provider_url: details.provider_url.clone(),
            ..self
        }
    }

    pub fn with_historic(self, historic: &HistoricGrades) -> Self {
        Self {
            most_common_grade: historic.most_common_grade.clone(),
            minimum_grade: historic.minimum_grade.clone(),
            maximum_grade: historic.maximum_grade.clone(),
            ..self
        }
    }

    /// Value of one field
    pub fn get(&self, field: CourseField) -> &str {
        match field {
            CourseField::UcasId => &self.ucas_id,
            CourseField::Provider => &self.provider,
            CourseField::Title => &self.title,
            CourseField::Qualification => &self.qualification,
            CourseField::StudyMode => &self.study_mode,
            CourseField::Duration => &self.duration,
            CourseField::ALevelText => &self.a_level_text,
            CourseField::ALevel => &self.a_level,
            CourseField::UcasTariffText => &self.ucas_tariff_text,
            CourseField::UcasTariff => &self.ucas_tariff,
            CourseField::MostCommonGrade => &self.most_common_grade,
            CourseField::MinimumGrade => &self.minimum_grade,
            CourseField::MaximumGrade => &self.maximum_grade,
            CourseField::Location => &self.location,
            CourseField::InstitutionCode => &self.institution_code,
            CourseField::CourseCode => &self.course_code,
            CourseField::ProviderSort => &self.provider_sort,
            CourseField::ProviderUrl => &self.provider_url,
        }
    }

    /// Field values in column order
    pub fn to_row(&self) -> Vec<String> {
        CourseField::ALL
            .iter()
            .map(|field| self.get(*field).to_string())
            .collect()
    }
}

/// Key under which the course id is stored in a confirmation-rate document
pub const UCAS_ID_KEY: &str = "ucas_id";

/// Per-course mapping of predicted grade to confirmation rate
///
/// Filled incrementally: a grade is present once its rate has been fetched,
/// even when the published rate is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationRates {
    pub ucas_id: String,
    rates: BTreeMap<String, String>,
}

impl ConfirmationRates {
    pub fn new(ucas_id: impl Into<String>) -> Self {
        Self {
            ucas_id: ucas_id.into(),
            rates: BTreeMap::new(),
        }
    }

    /// Reads the cached document form; non-string values are ignored
    pub fn from_record(record: &Record) -> Self {
        let mut rates = Self::default();
        for (key, value) in record {
            let Some(value) = value.as_str() else {
                continue;
            };
            if key == UCAS_ID_KEY {
                rates.ucas_id = value.to_string();
            } else {
                rates.rates.insert(key.clone(), value.to_string());
            }
        }
        rates
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(UCAS_ID_KEY.to_string(), self.ucas_id.clone().into());
        for (grade, rate) in &self.rates {
            record.insert(grade.clone(), rate.clone().into());
        }
        record
    }

    pub fn get(&self, grade: &str) -> Option<&str> {
        self.rates.get(grade).map(String::as_str)
    }

    pub fn contains(&self, grade: &str) -> bool {
        self.rates.contains_key(grade)
    }

    pub fn insert(&mut self, grade: impl Into<String>, rate: impl Into<String>) {
        self.rates.insert(grade.into(), rate.into());
    }

    /// Requested grades not yet present, deduplicated, in request order
    pub fn missing<'a>(&self, grades: &'a [String]) -> Vec<&'a str> {
        let mut missing: Vec<&str> = Vec::new();
        for grade in grades {
            if !self.contains(grade) && !missing.contains(&grade.as_str()) {
                missing.push(grade);
            }
        }
        missing
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn grades(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }
}

/// Headers of the confirmation-rate export: every key seen, sorted in reverse
///
/// Grades sort after `ucas_id` in reverse order, so the id column comes first
/// followed by grades from lowest to highest.
pub fn confirmation_rate_headers(rates: &[ConfirmationRates]) -> Vec<String> {
    let mut headers: Vec<String> = rates
        .iter()
        .flat_map(|r| r.grades().map(str::to_string))
        .chain(std::iter::once(UCAS_ID_KEY.to_string()))
        .collect();
    headers.sort_unstable_by(|a, b| b.cmp(a));
    headers.dedup();
    headers
}

/// One confirmation-rate row laid out under `headers`
pub fn confirmation_rate_row(rates: &ConfirmationRates, headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|header| {
            if header == UCAS_ID_KEY {
                rates.ucas_id.clone()
            } else {
                rates.get(header).unwrap_or_default().to_string()
            }
        })
        .collect()
}
