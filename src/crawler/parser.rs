//! Catalogue page parser
//!
//! This module turns a catalogue search page into entity summaries:
//! - The course id (from the article's `id` attribute)
//! - Provider, title and qualification, which key the course's cache location
//!
//! It also normalizes course ids given as catalogue URLs.

use scraper::{ElementRef, Html, Selector};

/// Matches one course article on a catalogue page
const ARTICLE_SELECTOR: &str = "app-courses-view app-course article";
const PROVIDER_SELECTOR: &str = "div.provider";
const TITLE_SELECTOR: &str = "header h2";
const QUALIFICATION_SELECTOR: &str = "div.qualification dd";

/// One course as listed on a catalogue page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySummary {
    pub id: String,
    pub provider: String,
    pub title: String,
    pub qualification: String,
}

/// Extracts every course article from a catalogue page, in page order
///
/// Articles without an `id` attribute are skipped. Missing fields are empty
/// strings. A page with no articles yields an empty list, which is how the
/// catalogue signals the end of the results.
///
/// # Example
///
/// ```
/// use course_harvest::crawler::parse_catalogue_page;
///
/// let html = r#"<app-courses-view><app-course><article id="abc">
///     <header><h2>Maths</h2></header>
/// </article></app-course></app-courses-view>"#;
/// let summaries = parse_catalogue_page(html);
/// assert_eq!(summaries[0].id, "abc");
/// assert_eq!(summaries[0].title, "Maths");
/// ```
pub fn parse_catalogue_page(html: &str) -> Vec<EntitySummary> {
    let document = Html::parse_document(html);

    let (Ok(article), Ok(provider), Ok(title), Ok(qualification)) = (
        Selector::parse(ARTICLE_SELECTOR),
        Selector::parse(PROVIDER_SELECTOR),
        Selector::parse(TITLE_SELECTOR),
        Selector::parse(QUALIFICATION_SELECTOR),
    ) else {
        return Vec::new();
    };

    let mut summaries = Vec::new();

    for element in document.select(&article) {
        let Some(id) = element.value().attr("id").map(str::trim).filter(|id| !id.is_empty()) else {
            tracing::warn!("Skipping catalogue article without an id");
            continue;
        };

        summaries.push(EntitySummary {
            id: id.to_string(),
            provider: first_text(&element, &provider),
            title: first_text(&element, &title),
            qualification: first_text(&element, &qualification),
        });
    }

    summaries
}

/// Text of the first match below `element`, whitespace-collapsed
fn first_text(element: &ElementRef<'_>, selector: &Selector) -> String {
    element
        .select(selector)
        .next()
        .map(|matched| {
            matched
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Reduces a course id given as a catalogue URL to the bare id
///
/// URLs are reduced to their last path segment without a query string; other
/// input is returned trimmed.
pub fn parse_course_id(raw: &str) -> String {
    let raw = raw.trim();

    if raw.to_ascii_lowercase().starts_with("http") {
        let last = raw.rsplit('/').next().unwrap_or(raw);
        return last.split('?').next().unwrap_or(last).to_string();
    }

    raw.to_string()
}
