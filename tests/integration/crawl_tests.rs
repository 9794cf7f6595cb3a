//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the catalogue and the statistics
//! APIs and run full crawls against a temporary cache.

use course_harvest::config::{Config, EndpointsConfig};
use course_harvest::crawler::{
    course_ids_document, entity_location, not_found_record, CrawlOrchestrator,
    CONFIRMATION_RATES_DOCUMENT, DETAIL_DOCUMENT, HISTORIC_DOCUMENT,
};
use course_harvest::output::export;
use course_harvest::storage::{CacheLocation, CacheStore};
use course_harvest::{FetchError, HarvestError, Record};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CATALOGUE_PATH: &str = "/coursedisplay/results/courses";
const DETAIL_PATH: &str = "/search/api/v3/courses";
const CONFIRMATION_PATH: &str = "/historic-grades-api/loggedIn";

/// One course as listed in the mock catalogue
#[derive(Clone, Copy)]
struct Course {
    id: &'static str,
    provider: &'static str,
    title: &'static str,
    qualification: &'static str,
}

const FIRST: Course = Course {
    id: "course-1",
    provider: "University of Testing",
    title: "Computer Science",
    qualification: "BSc (Hons)",
};

const SECOND: Course = Course {
    id: "course-2",
    provider: "Example College",
    title: "Software Engineering",
    qualification: "MEng",
};

/// Creates a test configuration pointing every endpoint at the mock server
fn create_test_config(server: &MockServer, dir: &Path, grades: &[&str]) -> Config {
    let mut config = Config::default();

    config.crawler.search_term = "Computer Science".to_string();
    config.crawler.destination = "Undergraduate".to_string();
    config.crawler.study_year = 2026;
    config.crawler.predicted_grades = grades.iter().map(|g| g.to_string()).collect();

    config.fetcher.max_retries = 2;
    config.fetcher.timeout_ms = 2_000;
    config.fetcher.connect_timeout_ms = 2_000;
    config.fetcher.retry_delay_ms = 10;
    config.fetcher.error_log_path = dir.join("errors.txt");

    config.endpoints = EndpointsConfig {
        catalogue_url: server.uri(),
        search_api_url: server.uri(),
        historic_api_url: server.uri(),
    };

    config.cache.output_root = dir.to_path_buf();
    config.cache.current = "data".to_string();
    config.cache.fallbacks = vec!["v1.1".to_string()];

    config
}

fn catalogue_page(courses: &[Course]) -> String {
    let articles: String = courses
        .iter()
        .map(|course| {
            format!(
                r#"<app-course><article id="{}">
                    <header><h2>{}</h2></header>
                    <div class="provider">{}</div>
                    <div class="qualification"><dl><dd>{}</dd></dl></div>
                </article></app-course>"#,
                course.id, course.title, course.provider, course.qualification
            )
        })
        .collect();

    format!(
        "<html><body><app-courses-view>{}</app-courses-view></body></html>",
        articles
    )
}

fn detail_body(course: &Course) -> Value {
    json!({
        "course": {
            "id": course.id,
            "applicationCode": "G400",
            "courseTitle": course.title,
            "provider": {
                "name": course.provider,
                "providerSort": course.provider,
                "institutionCode": "T10"
            },
            "options": [{
                "location": {"name": "Main Site"},
                "providerCourseUrl": "https://example.ac.uk/course",
                "outcomeQualification": {"caption": course.qualification},
                "studyMode": {"caption": "Full-time"},
                "duration": {"quantity": 3, "durationType": {"caption": "Years"}},
                "academicEntryRequirements": {
                    "qualifications": [{
                        "qualificationName": "A level",
                        "summary": {"offer": "AAB", "requirements": "Including Maths"}
                    }]
                }
            }]
        }
    })
}

fn historic_body() -> Value {
    json!({"results": [{"mostCommonGrade": "AAB", "minimumGrade": "BBB", "maximumGrade": "A*AA"}]})
}

fn confirmation_payload(course: &Course, grade: &str) -> Value {
    json!({"courseIds": [course.id], "qualificationType": "A_level", "grade": grade})
}

/// Mounts catalogue pages; the page after the last one lists no courses
async fn mount_catalogue(server: &MockServer, pages: &[&[Course]]) {
    for (index, courses) in pages.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(CATALOGUE_PATH))
            .and(query_param("pageNumber", (index + 1).to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_string(catalogue_page(courses)))
            .expect(1)
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path(CATALOGUE_PATH))
        .and(query_param("pageNumber", (pages.len() + 1).to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalogue_page(&[])))
        .expect(1)
        .mount(server)
        .await;
}

/// Mounts detail, historic and confirmation-rate responses for one course
async fn mount_course(server: &MockServer, course: &Course, grades: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("courseDetailsRequest.coursePrimaryId", course.id))
        .and(query_param("courseDetailsRequest.academicYearId", "2026"))
        .and(query_param("courseDetailsRequest.courseType", "Undergraduate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(course)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/historic-grades-api/loggedOut/{}", course.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(historic_body()))
        .mount(server)
        .await;

    for (grade, rate) in grades {
        Mock::given(method("POST"))
            .and(path(CONFIRMATION_PATH))
            .and(body_json(confirmation_payload(course, grade)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"results": [{"confirmationRate": rate}]})),
            )
            .mount(server)
            .await;
    }
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}

async fn post_grades(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.method == wiremock::http::Method::Post)
        .filter_map(|request| {
            serde_json::from_slice::<Value>(&request.body)
                .ok()
                .and_then(|body| body["grade"].as_str().map(str::to_string))
        })
        .collect()
}

fn location(course: &Course) -> CacheLocation {
    entity_location(course.provider, course.title, course.qualification, 2026)
}

fn object(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        _ => panic!("expected a JSON object"),
    }
}

#[tokio::test]
async fn test_two_page_catalogue_processes_two_entities() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), &["AAA", "BBB"]);

    mount_catalogue(&server, &[&[FIRST, SECOND]]).await;
    mount_course(&server, &FIRST, &[("AAA", "95%"), ("BBB", "60%")]).await;
    mount_course(&server, &SECOND, &[("AAA", "90%"), ("BBB", "")]).await;

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let report = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    assert_eq!(report.summary.pages(), 2);
    assert_eq!(report.summary.pages_fetched, 2);
    assert_eq!(report.summary.entities_processed, 2);
    assert_eq!(report.entities.len(), 2);

    // Page order is preserved
    let first = &report.entities[0];
    assert_eq!(first.course.ucas_id, "course-1");
    assert_eq!(first.course.title, "Computer Science");
    assert_eq!(first.course.a_level, "AAB");
    assert_eq!(first.course.minimum_grade, "BBB");
    assert_eq!(first.course.duration, "3 Years");
    assert_eq!(first.confirmation_rates.get("AAA"), Some("95%"));
    assert_eq!(report.entities[1].course.ucas_id, "course-2");
    assert_eq!(report.entities[1].confirmation_rates.get("BBB"), Some(""));

    // Documents land in each entity's cache directory
    let store = CacheStore::new(dir.path().join("data"));
    for course in [&FIRST, &SECOND] {
        assert!(store.contains(&location(course), DETAIL_DOCUMENT));
        assert!(store.contains(&location(course), HISTORIC_DOCUMENT));
        assert!(store.contains(&location(course), CONFIRMATION_RATES_DOCUMENT));
    }

    // Ids found by the search
    assert_eq!(
        store.read_lines(&CacheLocation::root(), &course_ids_document("Computer Science")),
        vec!["course-1", "course-2"]
    );

    // 2 pages, then detail + historic + 2 grades per course
    assert_eq!(request_count(&server).await, 2 + 2 * 4);
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), &["AAA"]);

    mount_catalogue(&server, &[&[FIRST, SECOND]]).await;
    mount_course(&server, &FIRST, &[("AAA", "95%")]).await;
    mount_course(&server, &SECOND, &[("AAA", "90%")]).await;

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let first_run = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();
    let after_first_run = request_count(&server).await;

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let second_run = orchestrator.crawl("Computer Science").await.unwrap();
    let stats = orchestrator.close();

    assert_eq!(request_count(&server).await, after_first_run);
    assert_eq!(stats.attempts, 0);
    assert_eq!(second_run.summary.pages_fetched, 0);
    assert_eq!(second_run.summary.pages_from_cache, 2);
    assert_eq!(second_run.summary.documents_fetched, 0);
    assert_eq!(second_run.entities, first_run.entities);
}

#[tokio::test]
async fn test_refresh_catalogue_refetches_pages_only() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, dir.path(), &["AAA"]);

    Mock::given(method("GET"))
        .and(path(CATALOGUE_PATH))
        .and(query_param("pageNumber", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalogue_page(&[FIRST])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CATALOGUE_PATH))
        .and(query_param("pageNumber", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalogue_page(&[])))
        .expect(2)
        .mount(&server)
        .await;
    mount_course(&server, &FIRST, &[("AAA", "95%")]).await;

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    config.crawler.refresh_catalogue = true;
    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let report = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    assert_eq!(report.summary.pages_fetched, 2);
    assert_eq!(report.summary.documents_fetched, 0);
}

#[tokio::test]
async fn test_missing_grades_are_filled_incrementally() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalogue(&server, &[&[FIRST]]).await;
    mount_course(&server, &FIRST, &[("AAA", "95%"), ("BBB", "60%")]).await;

    let config = create_test_config(&server, dir.path(), &["AAA"]);
    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    assert_eq!(post_grades(&server).await, vec!["AAA"]);

    let config = create_test_config(&server, dir.path(), &["AAA", "BBB"]);
    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let report = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    // Only the newly requested grade went over the network
    assert_eq!(post_grades(&server).await, vec!["AAA", "BBB"]);

    let rates = &report.entities[0].confirmation_rates;
    assert_eq!(rates.ucas_id, "course-1");
    assert_eq!(rates.get("AAA"), Some("95%"));
    assert_eq!(rates.get("BBB"), Some("60%"));

    let cached = CacheStore::new(dir.path().join("data"))
        .read(&location(&FIRST), CONFIRMATION_RATES_DOCUMENT, false)
        .unwrap();
    assert_eq!(
        cached,
        object(json!({"ucas_id": "course-1", "AAA": "95%", "BBB": "60%"}))
    );
}

#[tokio::test]
async fn test_unavailable_documents_are_retried_next_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), &["AAA"]);

    mount_catalogue(&server, &[&[FIRST]]).await;

    // Historic grades fail once, then succeed
    Mock::given(method("GET"))
        .and(path(format!("/historic-grades-api/loggedOut/{}", FIRST.id)))
        .respond_with(ResponseTemplate::new(503).set_body_string("  Service\n\n  Unavailable  "))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_course(&server, &FIRST, &[("AAA", "95%")]).await;

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let first_run = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    // A partial record is still produced
    assert_eq!(first_run.summary.documents_unavailable, 1);
    assert_eq!(first_run.entities[0].course.title, "Computer Science");
    assert_eq!(first_run.entities[0].course.minimum_grade, "");

    let store = CacheStore::new(dir.path().join("data"));
    assert!(!store.contains(&location(&FIRST), HISTORIC_DOCUMENT));

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let second_run = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    assert_eq!(second_run.summary.documents_fetched, 1);
    assert_eq!(second_run.entities[0].course.minimum_grade, "BBB");
    assert!(store.contains(&location(&FIRST), HISTORIC_DOCUMENT));
}

#[tokio::test]
async fn test_not_found_course_still_yields_record() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), &["AAA"]);

    mount_catalogue(&server, &[&[FIRST]]).await;
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/historic-grades-api/loggedOut/{}", FIRST.id)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CONFIRMATION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let report = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    let course = &report.entities[0].course;
    assert_eq!(course.ucas_id, "course-1");
    assert_eq!(course.title, "");
    assert_eq!(course.a_level, "No data");
    assert_eq!(report.entities[0].confirmation_rates.get("AAA"), Some(""));

    // The absent detail is remembered rather than retried
    let store = CacheStore::new(dir.path().join("data"));
    assert_eq!(
        store.read(&location(&FIRST), DETAIL_DOCUMENT, false),
        Some(not_found_record())
    );
}

#[tokio::test]
async fn test_not_found_lookups_are_not_repeated() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), &["AAA"]);

    mount_catalogue(&server, &[&[FIRST]]).await;
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(&FIRST)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/historic-grades-api/loggedOut/{}", FIRST.id)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CONFIRMATION_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let first_run = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    // 2 pages, detail, historic, one grade
    assert_eq!(request_count(&server).await, 5);
    assert_eq!(first_run.summary.documents_unavailable, 2);
    assert_eq!(first_run.entities[0].course.minimum_grade, "");
    assert_eq!(first_run.entities[0].confirmation_rates.get("AAA"), Some(""));

    let store = CacheStore::new(dir.path().join("data"));
    assert!(store.contains(&location(&FIRST), HISTORIC_DOCUMENT));
    assert_eq!(
        store.read(&location(&FIRST), CONFIRMATION_RATES_DOCUMENT, false),
        Some(object(json!({"ucas_id": "course-1", "AAA": ""})))
    );

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let second_run = orchestrator.crawl("Computer Science").await.unwrap();
    let stats = orchestrator.close();

    assert_eq!(request_count(&server).await, 5);
    assert_eq!(stats.attempts, 0);
    assert_eq!(second_run.summary.documents_from_cache, 3);
    assert_eq!(second_run.entities, first_run.entities);
}

#[tokio::test]
async fn test_repeated_grade_is_requested_and_counted_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), &["AAA", "AAA"]);

    mount_catalogue(&server, &[&[FIRST]]).await;
    mount_course(&server, &FIRST, &[("AAA", "95%")]).await;

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let report = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    assert_eq!(post_grades(&server).await, vec!["AAA"]);
    assert_eq!(report.summary.documents_from_cache, 0);
    // detail, historic, one grade
    assert_eq!(report.summary.documents_fetched, 3);

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let again = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    assert_eq!(again.summary.documents_from_cache, 3);
}

#[tokio::test]
async fn test_terminal_page_failure_aborts_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server, dir.path(), &["AAA"]);
    config.fetcher.timeout_ms = 200;

    Mock::given(method("GET"))
        .and(path(CATALOGUE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(catalogue_page(&[FIRST]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let result = orchestrator.crawl("Computer Science").await;
    let stats = orchestrator.close();

    match result {
        Err(HarvestError::Fetch(FetchError::Exhausted { uri, attempts })) => {
            assert!(uri.contains("pageNumber=1"));
            assert_eq!(attempts, 2);
        }
        other => panic!("expected exhausted retries, got {:?}", other.map(|r| r.summary)),
    }

    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.terminal_failures, 1);

    let ledger = std::fs::read_to_string(dir.path().join("errors.txt")).unwrap();
    assert_eq!(ledger.lines().count(), 1);
    assert!(ledger.contains("pageNumber=1"));

    // Nothing past the failed page was written
    let store = CacheStore::new(dir.path().join("data"));
    assert!(store.list_entities(&CacheLocation::new(["providers"])).is_empty());
}

#[tokio::test]
async fn test_prior_version_cache_avoids_fetch() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), &["AAA"]);

    mount_catalogue(&server, &[&[FIRST]]).await;
    mount_course(&server, &FIRST, &[("AAA", "95%")]).await;

    // An earlier harvester version already cached the detail
    let legacy = CacheStore::new(dir.path().join("v1.1"));
    legacy.write(&location(&FIRST), DETAIL_DOCUMENT, object(detail_body(&FIRST)));

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let report = orchestrator.crawl("Computer Science").await.unwrap();
    orchestrator.close();

    let detail_requests = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == DETAIL_PATH)
        .count();
    assert_eq!(detail_requests, 0);
    assert_eq!(report.entities[0].course.course_code, "G400");

    // The fallback hit is not copied forward
    let current = CacheStore::new(dir.path().join("data"));
    assert!(!current.contains(&location(&FIRST), DETAIL_DOCUMENT));
}

#[tokio::test]
async fn test_acquire_from_list() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), &["AAA"]);

    mount_course(&server, &FIRST, &[("AAA", "95%")]).await;
    mount_course(&server, &SECOND, &[("AAA", "90%")]).await;
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("courseDetailsRequest.coursePrimaryId", "gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = CacheStore::new(dir.path().join("data"));
    store.write(
        &CacheLocation::root(),
        "wanted",
        vec![
            format!("https://digital.example.com/coursedisplay/courses/{}?year=2026", FIRST.id),
            SECOND.id.to_string(),
            "gone".to_string(),
            String::new(),
        ],
    );

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let report = orchestrator.acquire_from_list("wanted").await.unwrap();
    orchestrator.close();

    assert_eq!(report.entities.len(), 2);
    assert_eq!(report.entities[0].location, location(&FIRST));
    assert_eq!(report.entities[1].course.title, "Software Engineering");
    assert!(store.contains(&location(&SECOND), DETAIL_DOCUMENT));

    // Known ids resolve through the index without another detail lookup
    let before = request_count(&server).await;
    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let again = orchestrator.acquire_from_list("wanted").await.unwrap();
    orchestrator.close();

    assert_eq!(again.entities.len(), 2);
    // The id answered 404 is remembered in the index as well
    assert_eq!(request_count(&server).await, before);
}

#[tokio::test]
async fn test_rebuild_applies_filter_and_exports() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), &["AAA"]);

    mount_catalogue(&server, &[&[FIRST], &[SECOND]]).await;
    mount_course(&server, &FIRST, &[("AAA", "95%")]).await;
    mount_course(&server, &SECOND, &[("AAA", "90%")]).await;

    let mut orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let report = orchestrator.crawl("Computer Science").await.unwrap();
    assert_eq!(report.summary.pages(), 3);

    let store = orchestrator.store().clone();
    store.write(
        &CacheLocation::root(),
        "course_filter_criteria",
        object(json!({"criteria": [{"exclude": {"qualification": ["MEng"]}}]})),
    );

    let before = request_count(&server).await;
    let rebuild = orchestrator.rebuild();
    orchestrator.close();

    assert_eq!(request_count(&server).await, before);
    assert_eq!(rebuild.excluded, 1);
    assert_eq!(rebuild.courses.len(), 1);
    assert_eq!(rebuild.courses[0].ucas_id, "course-1");
    assert_eq!(rebuild.confirmation_rates[0].get("AAA"), Some("95%"));

    let paths = export(&store, &config.output, &rebuild).unwrap();
    let courses = std::fs::read_to_string(paths.courses).unwrap();
    assert_eq!(courses.lines().count(), 2);
    let rates = std::fs::read_to_string(paths.confirmation_rates.unwrap()).unwrap();
    assert_eq!(rates, "ucas_id,AAA\ncourse-1,95%\n");
}

#[tokio::test]
async fn test_rebuild_keeps_one_location_per_course() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), &["AAA"]);

    // The catalogue and the detail API spell the provider differently
    let store = CacheStore::new(dir.path().join("data"));
    let listed = location(&FIRST);
    let detailed = entity_location(
        "The University of Testing",
        FIRST.title,
        FIRST.qualification,
        2026,
    );
    for at in [&listed, &detailed] {
        store.write(at, DETAIL_DOCUMENT, object(detail_body(&FIRST)));
    }
    store.write(&location(&SECOND), DETAIL_DOCUMENT, object(detail_body(&SECOND)));

    let orchestrator = CrawlOrchestrator::new(&config).unwrap();
    let rebuild = orchestrator.rebuild();
    orchestrator.close();

    assert_eq!(request_count(&server).await, 0);
    assert_eq!(rebuild.duplicates, 1);
    let ids: Vec<&str> = rebuild.courses.iter().map(|c| c.ucas_id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"course-1"));
    assert!(ids.contains(&"course-2"));
    assert_eq!(rebuild.confirmation_rates.len(), 2);
}
