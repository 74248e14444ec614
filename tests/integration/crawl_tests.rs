//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! crawl cycle end-to-end through the real HTTP fetcher.

use recipe_harvest::config::{
    Config, CrawlerConfig, OutputConfig, SelectorProfile, SiteConfig, UserAgentConfig,
};
use recipe_harvest::crawler::{Coordinator, FetchError, Fetcher, HttpFetcher};
use recipe_harvest::output::RunOutcome;
use recipe_harvest::sink::{MemorySink, Sink, SqliteSink};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &str) -> Config {
    let host = url::Url::parse(base_url)
        .expect("Failed to parse base URL")
        .host_str()
        .expect("Failed to extract host")
        .to_string();

    Config {
        crawler: CrawlerConfig {
            workers: 3,
            min_request_delay_ms: 10, // Very short for testing
            backoff_base_ms: 10,
            backoff_max_ms: 50,
            request_timeout_secs: 5,
            ..CrawlerConfig::default()
        },
        site: SiteConfig {
            base_url: base_url.to_string(),
            taxonomy_path: "/".to_string(),
            category_prefix: "/recepty/".to_string(),
            allowed_domains: vec![host],
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
        selectors: SelectorProfile::default(),
    }
}

const TAXONOMY: &str = r#"<html><body>
    <div class="emotion-18mh8uc">
      <div class="emotion-w5dos9">
        <a href="/recepty/supy"><h3>Супы <span>3</span></h3></a>
        <div class="emotion-8asrz1"><a href="/recepty/supy/borshch"><span>Борщ <span>1</span></span></a></div>
      </div>
    </div>
    </body></html>"#;

fn listing(total: u32, hrefs: &[&str]) -> String {
    let cards: String = hrefs
        .iter()
        .map(|href| format!(r#"<div class="emotion-1eugp2w"><a href="{}">card</a></div>"#, href))
        .collect();
    format!(
        r#"<html><body><span class="emotion-1jdotsv">Найдено {} рецептов</span>{}</body></html>"#,
        total, cards
    )
}

fn recipe(title: &str) -> String {
    format!(
        r#"<html><body>
        <span itemprop="resultPhoto" content="https://img.example.com/{title}.jpg"></span>
        <div class="emotion-19rdt1j">
          <h1>{title}</h1>
          <div class="emotion-my9yfq">40 минут</div>
          <span itemprop="recipeYield"><span>4 порции</span></span>
        </div>
        <div class="emotion-aiknw3">Описание: {title}</div>
        </body></html>"#
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_into_sqlite() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", TAXONOMY.to_string()).await;

    // Page 2 is mounted before the bare listing so the query matcher wins
    Mock::given(method("GET"))
        .and(path("/recepty/supy"))
        .and(query_param("page", "2"))
        .respond_with(html(listing(3, &["/recepty/supy/ukha-3"])))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(
        &mock_server,
        "/recepty/supy",
        listing(3, &["/recepty/supy/borsch-1", "/recepty/supy/shchi-2"]),
    )
    .await;
    mount_page(
        &mock_server,
        "/recepty/supy/borshch",
        listing(1, &["/recepty/supy/borsch-1"]),
    )
    .await;

    for (slug, title) in [("borsch-1", "Борщ"), ("shchi-2", "Щи"), ("ukha-3", "Уха")] {
        Mock::given(method("GET"))
            .and(path(format!("/recepty/supy/{}", slug)))
            .respond_with(html(recipe(title)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("recipes.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());

    let sink = Arc::new(SqliteSink::open(&db_path).expect("Failed to open database"));
    let run_id = sink.begin_run("test-hash").unwrap();
    let fetcher = Arc::new(HttpFetcher::new(&config).expect("Failed to build fetcher"));

    let coordinator = Coordinator::new(config, fetcher, sink.clone(), CancellationToken::new())
        .expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Crawl failed");

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.categories, 2);
    assert_eq!(summary.recipes_succeeded, 3);
    assert_eq!(summary.recipes_dead_lettered, 0);
    assert!(summary.stalls.is_empty());

    // Parent references resolve within the stored taxonomy
    let categories = sink.categories().unwrap();
    assert_eq!(categories.len(), 2);
    for category in &categories {
        if let Some(parent) = &category.parent_slug {
            assert!(categories.iter().any(|c| &c.slug == parent));
        }
    }

    let borsch = sink.get_recipe(1).unwrap().expect("Recipe 1 missing");
    assert_eq!(borsch.name, "Борщ");
    assert_eq!(borsch.cooking_time, "40 минут");
    assert_eq!(borsch.number_servings, "4 порции");
    assert_eq!(borsch.description, "Описание: Борщ");
    assert_eq!(borsch.href, "/recepty/supy/borsch-1");

    // Listed only under the parent, so its owner is deterministic
    let shchi = sink.get_recipe(2).unwrap().expect("Recipe 2 missing");
    assert_eq!(shchi.category_slug, "supy");
    assert_eq!(sink.count_recipes().unwrap(), 3);

    let run = sink.latest_run().unwrap().unwrap();
    assert_eq!(run.id, run_id);
    assert_eq!(run.outcome, Some(RunOutcome::Completed));
    assert_eq!(run.recipes_succeeded, 3);
}

#[tokio::test]
async fn test_transient_server_error_is_retried() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", TAXONOMY.to_string()).await;
    mount_page(&mock_server, "/recepty/supy", listing(1, &["/recepty/supy/borsch-1"])).await;
    mount_page(&mock_server, "/recepty/supy/borshch", listing(0, &[])).await;

    // First request fails, the retry succeeds; no further requests
    Mock::given(method("GET"))
        .and(path("/recepty/supy/borsch-1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recepty/supy/borsch-1"))
        .respond_with(html(recipe("Борщ")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), ":memory:");
    let sink = Arc::new(MemorySink::new());
    let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());

    let summary = Coordinator::new(config, fetcher, sink.clone(), CancellationToken::new())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.recipes_succeeded, 1);
    assert_eq!(summary.recipes_dead_lettered, 0);
    assert!(summary.dead_letters.is_empty());
    assert_eq!(sink.recipe(1).unwrap().name, "Борщ");

    let recipe_requests = mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == "/recepty/supy/borsch-1")
        .count();
    assert_eq!(recipe_requests, 2);
}

#[tokio::test]
async fn test_too_many_requests_honours_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/page", recipe("x")).await;

    let config = create_test_config(&mock_server.uri(), ":memory:");
    let fetcher = HttpFetcher::new(&config).unwrap();
    let url = url::Url::parse(&format!("{}/page", mock_server.uri())).unwrap();

    let start = Instant::now();
    fetcher.fetch(&url).await.expect("Retry after 429 failed");

    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_too_many_requests_without_header_waits_twice_min_delay() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/page", recipe("x")).await;

    let mut config = create_test_config(&mock_server.uri(), ":memory:");
    config.crawler.min_request_delay_ms = 200;
    let fetcher = HttpFetcher::new(&config).unwrap();
    let url = url::Url::parse(&format!("{}/page", mock_server.uri())).unwrap();

    let start = Instant::now();
    fetcher.fetch(&url).await.expect("Retry after 429 failed");

    assert!(start.elapsed() >= Duration::from_millis(400));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_persistent_server_error_exhausts_fetch_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), ":memory:");
    config.crawler.max_fetch_retries = 2;
    let fetcher = HttpFetcher::new(&config).unwrap();
    let url = url::Url::parse(&format!("{}/page", mock_server.uri())).unwrap();

    let err = fetcher.fetch(&url).await.unwrap_err();

    match err {
        FetchError::Transient { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("Expected a transient failure, got {:?}", other),
    }
    // One rate-limit slot per request sent
    let host = url.host_str().unwrap();
    assert_eq!(fetcher.limiter().requests_made(host), 3);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_missing_recipe_is_dead_lettered() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", TAXONOMY.to_string()).await;
    mount_page(
        &mock_server,
        "/recepty/supy",
        listing(2, &["/recepty/supy/borsch-1", "/recepty/supy/gone-2"]),
    )
    .await;
    mount_page(&mock_server, "/recepty/supy/borshch", listing(0, &[])).await;
    mount_page(&mock_server, "/recepty/supy/borsch-1", recipe("Борщ")).await;

    // A 404 is permanent: exactly one request
    Mock::given(method("GET"))
        .and(path("/recepty/supy/gone-2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("recipes.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());

    let sink = Arc::new(SqliteSink::open(&db_path).unwrap());
    let run_id = sink.begin_run("hash").unwrap();
    let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());

    let summary = Coordinator::new(config, fetcher, sink.clone(), CancellationToken::new())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.recipes_succeeded, 1);
    assert_eq!(summary.recipes_dead_lettered, 1);
    let letter = summary.dead_letters_of("recipe").next().unwrap();
    assert!(letter.url.ends_with("/recepty/supy/gone-2"));
    assert_eq!(letter.attempts, 1);

    assert_eq!(sink.count_dead_letters(run_id).unwrap(), 1);
    assert!(sink.get_recipe(2).unwrap().is_none());
}

#[tokio::test]
async fn test_off_site_links_are_never_requested() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", TAXONOMY.to_string()).await;
    mount_page(
        &mock_server,
        "/recepty/supy",
        listing(1, &["https://elsewhere.invalid/recepty/supy/borsch-9"]),
    )
    .await;
    mount_page(&mock_server, "/recepty/supy/borshch", listing(0, &[])).await;

    let config = create_test_config(&mock_server.uri(), ":memory:");
    let sink = Arc::new(MemorySink::new());
    let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());

    let summary = Coordinator::new(config, fetcher, sink.clone(), CancellationToken::new())
        .unwrap()
        .run()
        .await
        .unwrap();

    let letter = summary.dead_letters_of("recipe").next().unwrap();
    assert!(letter.reason.contains("allow-list"));
    assert!(sink.recipes().is_empty());
}

#[tokio::test]
async fn test_unreadable_taxonomy_fails_run() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/", "<html><body>redesigned</body></html>".to_string()).await;

    let config = create_test_config(&mock_server.uri(), ":memory:");
    let sink = Arc::new(MemorySink::new());
    let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());

    let result = Coordinator::new(config, fetcher, sink.clone(), CancellationToken::new())
        .unwrap()
        .run()
        .await;

    assert!(matches!(
        result,
        Err(recipe_harvest::HarvestError::NoCategories { .. })
    ));
    assert!(sink.categories().is_empty());
    assert_eq!(sink.summary().unwrap().outcome, RunOutcome::Failed);
}

#[tokio::test]
async fn test_requests_to_one_domain_are_spaced() {
    let mock_server = MockServer::start().await;
    mount_page(&mock_server, "/page", recipe("x")).await;

    let mut config = create_test_config(&mock_server.uri(), ":memory:");
    config.crawler.min_request_delay_ms = 150;
    let fetcher = HttpFetcher::new(&config).unwrap();
    let url = url::Url::parse(&format!("{}/page", mock_server.uri())).unwrap();

    let start = Instant::now();
    for _ in 0..3 {
        fetcher.fetch(&url).await.unwrap();
    }

    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_non_html_response_is_permanent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 16], "image/jpeg"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), ":memory:");
    let fetcher = HttpFetcher::new(&config).unwrap();
    let url = url::Url::parse(&format!("{}/photo.jpg", mock_server.uri())).unwrap();

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Permanent { .. }));
}

#[tokio::test]
async fn test_memory_sink_is_idempotent_across_runs() {
    let mock_server = MockServer::start().await;

    mount_page(&mock_server, "/", TAXONOMY.to_string()).await;
    mount_page(&mock_server, "/recepty/supy", listing(1, &["/recepty/supy/borsch-1"])).await;
    mount_page(&mock_server, "/recepty/supy/borshch", listing(1, &["/recepty/supy/borsch-1"])).await;
    mount_page(&mock_server, "/recepty/supy/borsch-1", recipe("Борщ")).await;

    let sink = Arc::new(MemorySink::new());
    for _ in 0..2 {
        let config = create_test_config(&mock_server.uri(), ":memory:");
        let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
        let sink_handle: Arc<dyn Sink> = sink.clone();
        Coordinator::new(config, fetcher, sink_handle, CancellationToken::new())
            .unwrap()
            .run()
            .await
            .unwrap();
    }

    assert_eq!(sink.recipes().len(), 1);
    assert_eq!(sink.categories().len(), 2);
}
