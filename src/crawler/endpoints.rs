//! Request targets for the catalogue and the statistics APIs

use crate::config::EndpointsConfig;
use serde_json::{json, Value};
use url::Url;

/// Qualification type the confirmation-rate API is queried for
pub const QUALIFICATION_TYPE: &str = "A_level";

/// Headers sent with confirmation-rate requests
pub const CONFIRMATION_RATE_HEADERS: [(&str, &str); 1] =
    [("Content-type", "application/json; charset=UTF-8")];

/// Parsed base URLs with builders for every request the harvester makes
#[derive(Debug, Clone)]
pub struct Endpoints {
    catalogue: Url,
    search_api: Url,
    historic_api: Url,
}

impl Endpoints {
    pub fn from_config(config: &EndpointsConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            catalogue: Url::parse(&config.catalogue_url)?,
            search_api: Url::parse(&config.search_api_url)?,
            historic_api: Url::parse(&config.historic_api_url)?,
        })
    }

    /// One page of catalogue search results; pages start at 1
    pub fn catalogue_page(&self, term: &str, study_year: i32, destination: &str, page: u32) -> Url {
        let mut url = with_path(&self.catalogue, &["coursedisplay", "results", "courses"]);
        url.query_pairs_mut()
            .append_pair("searchTerm", term)
            .append_pair("studyYear", &study_year.to_string())
            .append_pair("destination", destination)
            .append_pair("pageNumber", &page.to_string());
        url
    }

    /// Course detail lookup
    pub fn course_details(&self, id: &str, study_year: i32, destination: &str) -> Url {
        let mut url = with_path(&self.search_api, &["search", "api", "v3", "courses"]);
        url.query_pairs_mut()
            .append_pair("courseDetailsRequest.coursePrimaryId", id)
            .append_pair("courseDetailsRequest.academicYearId", &study_year.to_string())
            .append_pair("courseDetailsRequest.courseType", destination);
        url
    }

    /// Aggregate historic grades of one course
    pub fn historic_grades(&self, id: &str) -> Url {
        with_path(&self.historic_api, &["historic-grades-api", "loggedOut", id])
    }

    /// Confirmation-rate lookup; the course and grade go in the POST body
    pub fn confirmation_rate(&self) -> Url {
        with_path(&self.historic_api, &["historic-grades-api", "loggedIn"])
    }
}

/// POST body of a confirmation-rate lookup
pub fn confirmation_rate_payload(id: &str, grade: &str) -> Value {
    json!({
        "courseIds": [id],
        "qualificationType": QUALIFICATION_TYPE,
        "grade": grade,
    })
}

/// Appends path segments to a base URL, keeping any path prefix it already has
fn with_path(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
