//! Crawl orchestration
//!
//! This module drives a crawl over one search term:
//! - Walks catalogue pages until one lists no courses
//! - For each course, loads detail, historic grades and confirmation rates,
//!   reading the cache first and fetching only what is missing
//! - Merges whatever sources are available into one course record
//! - Rebuilds exports from the cache alone, without network access

use crate::config::{Config, CrawlerConfig, OutputConfig};
use crate::course::{
    confirmation_rate, ConfirmationRates, CourseDetails, CourseRecord, FilterCriteria,
    HistoricGrades,
};
use crate::crawler::endpoints::{confirmation_rate_payload, Endpoints, CONFIRMATION_RATE_HEADERS};
use crate::crawler::fetcher::{decode_record, FetchClient, FetchOutcome, FetchStats};
use crate::crawler::parser::{parse_catalogue_page, parse_course_id, EntitySummary};
use crate::crawler::rate_limit::{RateLimiter, COURSE_CHANNEL, UNIVERSAL_CHANNEL};
use crate::storage::{CacheLocation, CacheStore};
use crate::{Record, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Root segment of every entity location
pub const PROVIDERS_SEGMENT: &str = "providers";

/// Root segment of cached catalogue pages
pub const SEARCH_SEGMENT: &str = "search";

/// Cached detail API body
pub const DETAIL_DOCUMENT: &str = "course";

/// Cached historic-grades API body
pub const HISTORIC_DOCUMENT: &str = "historic";

/// Cached grade → confirmation rate mapping
pub const CONFIRMATION_RATES_DOCUMENT: &str = "confirmation_rates";

/// Course id → entity location segments, at the cache root
pub const COURSE_INDEX_DOCUMENT: &str = "course-index";

/// Stand-in cached for a lookup answered 404
///
/// It reads back as present, so the lookup is not repeated, and parses as a
/// body with no results.
pub fn not_found_record() -> Record {
    let mut record = Record::new();
    record.insert("results".to_string(), serde_json::Value::Array(Vec::new()));
    record
}

/// Location of one course's cache directory
///
/// A crawl takes the names from the catalogue listing, while a course first
/// met through [`CrawlOrchestrator::acquire_from_list`] takes them from its
/// detail document. Should the two sources spell a provider or qualification
/// differently, one course is cached under two locations; [`CrawlOrchestrator::rebuild`]
/// keeps only the first of them.
pub fn entity_location(provider: &str, title: &str, qualification: &str, study_year: i32) -> CacheLocation {
    CacheLocation::new([
        PROVIDERS_SEGMENT,
        provider,
        title,
        qualification,
        &study_year.to_string(),
    ])
}

/// Location of the cached pages of one catalogue search
pub fn search_location(term: &str, destination: &str, study_year: i32) -> CacheLocation {
    CacheLocation::new([SEARCH_SEGMENT, term, destination, &study_year.to_string()])
}

/// Name of the line-list of course ids found by a search
pub fn course_ids_document(term: &str) -> String {
    format!("course-ids-{}", term)
}

fn page_document(page: u32) -> String {
    format!("page-{}", page)
}

/// Counters for one crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Catalogue pages fetched over the network
    pub pages_fetched: u64,

    /// Catalogue pages read from the cache
    pub pages_from_cache: u64,

    /// Courses run through the per-entity pipeline
    pub entities_processed: u64,

    /// Documents (or confirmation rates) served from the cache
    pub documents_from_cache: u64,

    /// Documents (or confirmation rates) fetched and cached
    pub documents_fetched: u64,

    /// Lookups that got a classified non-success answer this run
    pub documents_unavailable: u64,
}

impl CrawlSummary {
    /// Catalogue pages consumed, the final empty page included
    pub fn pages(&self) -> u64 {
        self.pages_fetched + self.pages_from_cache
    }
}

/// One course after the per-entity pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedEntity {
    pub location: CacheLocation,
    pub course: CourseRecord,
    pub confirmation_rates: ConfirmationRates,
}

/// Result of a crawl: counters plus every processed course in crawl order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub summary: CrawlSummary,
    pub entities: Vec<ProcessedEntity>,
}

/// Exportable data rebuilt from the cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rebuild {
    pub courses: Vec<CourseRecord>,
    pub confirmation_rates: Vec<ConfirmationRates>,
    /// Courses left out by the filter
    pub excluded: usize,
    /// Cached locations skipped because their course id was already rebuilt
    pub duplicates: usize,
}

/// Cache-first crawler over the course catalogue
pub struct CrawlOrchestrator {
    crawler: CrawlerConfig,
    output: OutputConfig,
    endpoints: Endpoints,
    client: FetchClient,
    store: CacheStore,
    index: BTreeMap<String, CacheLocation>,
    summary: CrawlSummary,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator from configuration
    ///
    /// # Errors
    ///
    /// Fails if an endpoint URL does not parse or the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let endpoints = Endpoints::from_config(&config.endpoints)?;
        let rate_limiter = RateLimiter::new(&config.rate_limits);
        let client = FetchClient::new(
            config.fetcher.clone(),
            config.user_agent.clone(),
            rate_limiter,
        )?;
        let store = CacheStore::from_config(&config.cache);

        Ok(Self::with_parts(
            config.crawler.clone(),
            config.output.clone(),
            endpoints,
            client,
            store,
        ))
    }

    /// Assembles an orchestrator from already-built parts
    pub fn with_parts(
        crawler: CrawlerConfig,
        output: OutputConfig,
        endpoints: Endpoints,
        client: FetchClient,
        store: CacheStore,
    ) -> Self {
        let index = load_index(&store);

        Self {
            crawler,
            output,
            endpoints,
            client,
            store,
            index,
            summary: CrawlSummary::default(),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn fetch_stats(&self) -> FetchStats {
        self.client.stats()
    }

    /// Crawls every catalogue page for `term`
    ///
    /// Stops at the first page listing no courses. Afterwards the ids found
    /// are written as the line-list `course-ids-<term>` and the course index
    /// is saved.
    ///
    /// # Errors
    ///
    /// A terminal fetch failure on a page or an entity aborts the crawl.
    pub async fn crawl(&mut self, term: &str) -> Result<CrawlReport> {
        self.summary = CrawlSummary::default();
        let mut entities = Vec::new();
        let mut course_ids = Vec::new();
        let mut page = 1;

        tracing::info!(
            term,
            destination = %self.crawler.destination,
            study_year = self.crawler.study_year,
            "Starting crawl"
        );

        loop {
            let html = self.catalogue_page(term, page).await?;
            let summaries = parse_catalogue_page(&html);

            if summaries.is_empty() {
                tracing::info!(term, page, "No courses on page, crawl complete");
                break;
            }

            tracing::info!(term, page, courses = summaries.len(), "Processing catalogue page");

            for summary in &summaries {
                entities.push(self.process_entity(summary).await?);
                course_ids.push(summary.id.clone());
            }

            page += 1;
        }

        self.store
            .write(&CacheLocation::root(), &course_ids_document(term), course_ids);
        self.save_index();

        tracing::info!(
            term,
            pages = self.summary.pages(),
            entities = self.summary.entities_processed,
            from_cache = self.summary.documents_from_cache,
            fetched = self.summary.documents_fetched,
            "Crawl finished"
        );

        Ok(CrawlReport {
            summary: self.summary,
            entities,
        })
    }

    /// Runs the per-entity pipeline for every course id in a cached line-list
    ///
    /// Lines may be bare ids or catalogue URLs. Ids missing from the course
    /// index have their detail fetched first to learn their location; ids the
    /// detail API does not know are skipped.
    pub async fn acquire_from_list(&mut self, list_name: &str) -> Result<CrawlReport> {
        self.summary = CrawlSummary::default();
        let mut entities = Vec::new();

        let ids: Vec<String> = self
            .store
            .read_lines(&CacheLocation::root(), list_name)
            .iter()
            .map(|line| parse_course_id(line))
            .filter(|id| !id.is_empty())
            .collect();

        tracing::info!(list = list_name, courses = ids.len(), "Acquiring courses from list");

        for id in ids {
            let Some(summary) = self.resolve_summary(&id).await? else {
                tracing::warn!(id = %id, "Course not found, skipping");
                continue;
            };
            entities.push(self.process_entity(&summary).await?);
        }

        self.save_index();

        Ok(CrawlReport {
            summary: self.summary,
            entities,
        })
    }

    /// Runs detail, historic grades and confirmation rates for one course
    ///
    /// Each document is read from the cache first and fetched only when
    /// missing. A 404 is final and cached as [`not_found_record`]; any other
    /// non-success status is left out of the cache so a later run retries it.
    pub async fn process_entity(&mut self, entity: &EntitySummary) -> Result<ProcessedEntity> {
        let location = entity_location(
            &entity.provider,
            &entity.title,
            &entity.qualification,
            self.crawler.study_year,
        );

        tracing::info!(
            id = %entity.id,
            provider = %entity.provider,
            title = %entity.title,
            qualification = %entity.qualification,
            "Processing course"
        );

        let detail_uri = self
            .endpoints
            .course_details(&entity.id, self.crawler.study_year, &self.crawler.destination);
        let detail = self
            .cached_or_fetched(&location, DETAIL_DOCUMENT, detail_uri.as_str(), COURSE_CHANNEL)
            .await?;

        let historic_uri = self.endpoints.historic_grades(&entity.id);
        let historic = self
            .cached_or_fetched(&location, HISTORIC_DOCUMENT, historic_uri.as_str(), UNIVERSAL_CHANNEL)
            .await?;

        let confirmation_rates = self.confirmation_rates(&location, &entity.id).await?;

        let mut course = CourseRecord::merge(
            detail.as_ref().and_then(CourseDetails::from_json).as_ref(),
            historic.as_ref().and_then(HistoricGrades::from_json).as_ref(),
        );
        if course.ucas_id.is_empty() {
            course.ucas_id = entity.id.clone();
        }

        self.index.insert(entity.id.clone(), location.clone());
        self.summary.entities_processed += 1;

        Ok(ProcessedEntity {
            location,
            course,
            confirmation_rates,
        })
    }

    /// Rebuilds exportable records from every cached entity
    ///
    /// Makes no network calls. Courses excluded by the filter criteria are
    /// dropped together with their confirmation rates, as is every location
    /// after the first carrying an already-seen course id.
    pub fn rebuild(&self) -> Rebuild {
        let filter = FilterCriteria::load(&self.store, &self.output.filter_criteria_document);
        let mut rebuild = Rebuild::default();
        let mut seen = BTreeSet::new();

        for location in self.list_cached() {
            let detail = self.store.read(&location, DETAIL_DOCUMENT, true);
            let historic = self.store.read(&location, HISTORIC_DOCUMENT, true);

            let course = CourseRecord::merge(
                detail.as_ref().and_then(CourseDetails::from_json).as_ref(),
                historic.as_ref().and_then(HistoricGrades::from_json).as_ref(),
            );

            if !course.ucas_id.is_empty() && !seen.insert(course.ucas_id.clone()) {
                tracing::warn!(
                    %location,
                    ucas_id = %course.ucas_id,
                    "Course cached under more than one location, skipping duplicate"
                );
                rebuild.duplicates += 1;
                continue;
            }

            if filter.excludes(&course) {
                rebuild.excluded += 1;
                continue;
            }

            let mut rates = self
                .store
                .read(&location, CONFIRMATION_RATES_DOCUMENT, true)
                .map(|record| ConfirmationRates::from_record(&record))
                .unwrap_or_default();
            if rates.ucas_id.is_empty() {
                rates.ucas_id = course.ucas_id.clone();
            }

            rebuild.courses.push(course);
            rebuild.confirmation_rates.push(rates);
        }

        tracing::info!(
            courses = rebuild.courses.len(),
            excluded = rebuild.excluded,
            duplicates = rebuild.duplicates,
            "Rebuilt course records from cache"
        );

        rebuild
    }

    /// Every entity location in the current cache
    pub fn list_cached(&self) -> Vec<CacheLocation> {
        self.store
            .list_entities(&CacheLocation::new([PROVIDERS_SEGMENT]))
    }

    /// Shuts down the fetch client, returning its final counters
    pub fn close(self) -> FetchStats {
        let stats = self.client.stats();
        self.client.close();
        stats
    }

    /// Markup of one catalogue page, cache first
    ///
    /// A page answered with a non-success status counts as empty and is not
    /// cached.
    async fn catalogue_page(&mut self, term: &str, page: u32) -> Result<String> {
        let location = search_location(term, &self.crawler.destination, self.crawler.study_year);
        let name = page_document(page);

        if !self.crawler.refresh_catalogue {
            if let Some(html) = self.store.read_markup(&location, &name) {
                tracing::debug!(term, page, "Catalogue page served from cache");
                self.summary.pages_from_cache += 1;
                return Ok(html);
            }
        }

        let uri = self.endpoints.catalogue_page(
            term,
            self.crawler.study_year,
            &self.crawler.destination,
            page,
        );
        let outcome = self.client.fetch(uri.as_str()).await?;
        self.summary.pages_fetched += 1;

        match outcome {
            FetchOutcome::Success(body) => {
                let html = String::from_utf8_lossy(&body).into_owned();
                self.store.write(&location, &name, html.as_str());
                Ok(html)
            }
            _ => {
                tracing::warn!(term, page, "Catalogue page unavailable, treating as empty");
                Ok(String::new())
            }
        }
    }

    /// Reads a structured document, fetching and caching it when missing
    async fn cached_or_fetched(
        &mut self,
        location: &CacheLocation,
        name: &str,
        uri: &str,
        channel: &str,
    ) -> Result<Option<Record>> {
        if let Some(record) = self.store.read(location, name, true) {
            self.summary.documents_from_cache += 1;
            return Ok(Some(record));
        }

        match self.client.fetch_with_rate_limit(uri, channel).await? {
            FetchOutcome::Success(body) => {
                let record = decode_record(uri, &body);
                self.summary.documents_fetched += 1;
                if !record.is_empty() {
                    self.store.write(location, name, record.clone());
                }
                Ok(Some(record))
            }
            FetchOutcome::NotFound => {
                let record = not_found_record();
                self.summary.documents_unavailable += 1;
                self.store.write(location, name, record.clone());
                Ok(Some(record))
            }
            FetchOutcome::OtherError { .. } => {
                self.summary.documents_unavailable += 1;
                Ok(None)
            }
        }
    }

    /// Fills in the confirmation rate of every predicted grade not yet cached
    ///
    /// A grade answered 404 is stored with an empty rate.
    async fn confirmation_rates(
        &mut self,
        location: &CacheLocation,
        id: &str,
    ) -> Result<ConfirmationRates> {
        let mut rates = self
            .store
            .read(location, CONFIRMATION_RATES_DOCUMENT, true)
            .map(|record| ConfirmationRates::from_record(&record))
            .unwrap_or_else(|| ConfirmationRates::new(id));
        if rates.ucas_id.is_empty() {
            rates.ucas_id = id.to_string();
        }

        let grades = self.crawler.predicted_grades.clone();
        let missing = rates.missing(&grades);
        let requested = grades.iter().collect::<BTreeSet<_>>().len();
        self.summary.documents_from_cache += (requested - missing.len()) as u64;

        if missing.is_empty() {
            return Ok(rates);
        }

        let uri = self.endpoints.confirmation_rate();
        let mut added = 0;

        for grade in missing {
            let payload = confirmation_rate_payload(id, grade);
            let response = self
                .client
                .post_with_rate_limit(
                    uri.as_str(),
                    &payload,
                    &CONFIRMATION_RATE_HEADERS,
                    UNIVERSAL_CHANNEL,
                )
                .await?;

            match response {
                FetchOutcome::Success(body) => {
                    let rate = confirmation_rate(&decode_record(uri.as_str(), &body));
                    tracing::debug!(id, grade, rate = %rate, "Fetched confirmation rate");
                    rates.insert(grade, rate);
                    self.summary.documents_fetched += 1;
                    added += 1;
                }
                FetchOutcome::NotFound => {
                    rates.insert(grade, String::new());
                    self.summary.documents_unavailable += 1;
                    added += 1;
                }
                FetchOutcome::OtherError { .. } => {
                    self.summary.documents_unavailable += 1;
                }
            }
        }

        if added > 0 {
            self.store
                .write(location, CONFIRMATION_RATES_DOCUMENT, rates.to_record());
        }

        Ok(rates)
    }

    /// Finds a course's summary from the index, or from its detail when unindexed
    ///
    /// An id whose detail lookup answered 404 is indexed at the root location
    /// and resolves to `None` without another lookup.
    async fn resolve_summary(&mut self, id: &str) -> Result<Option<EntitySummary>> {
        if let Some(location) = self.index.get(id) {
            if location.is_empty() {
                return Ok(None);
            }
            if let [_, provider, title, qualification, _] = location.segments() {
                return Ok(Some(EntitySummary {
                    id: id.to_string(),
                    provider: provider.clone(),
                    title: title.clone(),
                    qualification: qualification.clone(),
                }));
            }
        }

        let uri = self
            .endpoints
            .course_details(id, self.crawler.study_year, &self.crawler.destination);
        let body = match self
            .client
            .fetch_with_rate_limit(uri.as_str(), COURSE_CHANNEL)
            .await?
        {
            FetchOutcome::Success(body) => decode_record(uri.as_str(), &body),
            FetchOutcome::NotFound => {
                self.summary.documents_unavailable += 1;
                self.index.insert(id.to_string(), CacheLocation::root());
                return Ok(None);
            }
            FetchOutcome::OtherError { .. } => {
                self.summary.documents_unavailable += 1;
                return Ok(None);
            }
        };

        let Some(details) = CourseDetails::from_json(&body) else {
            return Ok(None);
        };

        let summary = EntitySummary {
            id: id.to_string(),
            provider: details.provider,
            title: details.title,
            qualification: details.qualification,
        };
        let location = entity_location(
            &summary.provider,
            &summary.title,
            &summary.qualification,
            self.crawler.study_year,
        );

        self.summary.documents_fetched += 1;
        self.store.write(&location, DETAIL_DOCUMENT, body);

        Ok(Some(summary))
    }

    fn save_index(&self) {
        let mut record = Record::new();
        for (id, location) in &self.index {
            record.insert(id.clone(), location.segments().to_vec().into());
        }
        self.store
            .write(&CacheLocation::root(), COURSE_INDEX_DOCUMENT, record);
    }
}

/// Reads the course index; malformed entries are skipped
fn load_index(store: &CacheStore) -> BTreeMap<String, CacheLocation> {
    let Some(record) = store.read(&CacheLocation::root(), COURSE_INDEX_DOCUMENT, true) else {
        return BTreeMap::new();
    };

    record
        .iter()
        .filter_map(|(id, segments)| {
            let segments: Vec<&str> = segments
                .as_array()?
                .iter()
                .map(|segment| segment.as_str())
                .collect::<Option<_>>()?;
            Some((id.clone(), CacheLocation::new(segments)))
        })
        .collect()
}
