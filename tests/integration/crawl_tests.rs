//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end: fetch, extract, upsert and edge replace.

use sitegraph::config::{Config, CrawlerConfig, StatusConfig, StorageConfig, UserAgentConfig};
use sitegraph::storage::{LinkStore, PageStore};
use sitegraph::{CrawlService, CrawlStatus, SiteGraphError};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration storing into `dir`
fn create_test_config(dir: &TempDir, freshness_window_secs: u64) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_requests_per_crawl: 50,
            max_concurrency: 4,
            max_concurrent_jobs: 2,
            request_timeout_secs: 5,
            connect_timeout_secs: 5,
            allowed_domains: vec![],
            start_urls: vec![],
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
        },
        storage: StorageConfig {
            database_path: dir.path().join("graph.db").to_string_lossy().into_owned(),
        },
        status: StatusConfig {
            freshness_window_secs,
        },
    }
}

async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body.to_string())
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// A small site: home links to about (twice, once with a trailing slash),
/// to the blog through a query string, and off-site
async fn mount_site(server: &MockServer) {
    mount_page(
        server,
        "/",
        r#"<html><head><title>Home</title></head><body>
        <h1>Welcome</h1>
        <a href="/about">About</a>
        <a href="/about/">About again</a>
        <a href="/blog?page=2">Blog</a>
        <a href="https://elsewhere.test/">Elsewhere</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        server,
        "/about",
        r#"<html><head><title>About</title></head><body>
        <p>About us</p><a href="/">Home</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        server,
        "/blog",
        r#"<html><head><title>Blog</title></head><body>
        <a href="/about">Who we are</a>
        </body></html>"#,
    )
    .await;
}

#[tokio::test]
async fn test_full_crawl_builds_graph() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let service = CrawlService::from_config(create_test_config(&dir, 300)).unwrap();

    let accepted = service.start(1, vec![format!("{}/", base_url)]).unwrap();
    assert_eq!(accepted.status, "accepted");
    let summary = accepted.wait().await.expect("Crawl failed");

    assert_eq!(summary.pages_seen, 3);
    assert_eq!(summary.pages_saved, 3);
    assert_eq!(summary.extraction_failures, 0);
    assert_eq!(summary.persistence_failures, 0);

    let storage = service.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_pages(1).unwrap(), 3);

    let home = storage
        .get_page_by_url(1, &format!("{}/", base_url))
        .unwrap()
        .expect("home page stored");
    assert_eq!(home.title, "Home");
    assert_eq!(home.content_hash.len(), 64);
    assert_eq!(home.technical_data.headings[0].text, "Welcome");
    assert_eq!(home.technical_data.links_count, 4);

    // The blog was fetched with a query string but stored canonically
    let blog = storage
        .get_page_by_url(1, &format!("{}/blog", base_url))
        .unwrap()
        .expect("blog page stored");
    assert_eq!(blog.url, format!("{}/blog", base_url));

    // Home: about (collapsed) and blog, nothing off-site
    let home_edges = storage.outgoing_edges(home.id).unwrap();
    let mut targets: Vec<String> = home_edges.iter().map(|e| e.to_url.clone()).collect();
    targets.sort_unstable();
    assert_eq!(
        targets,
        vec![format!("{}/about", base_url), format!("{}/blog", base_url)]
    );
    let about_edge = home_edges
        .iter()
        .find(|e| e.to_url.ends_with("/about"))
        .unwrap();
    assert_eq!(about_edge.anchor.as_deref(), Some("About"));

    // About was written after home, so its edge back resolves
    let about = storage
        .get_page_by_url(1, &format!("{}/about", base_url))
        .unwrap()
        .unwrap();
    let about_edges = storage.outgoing_edges(about.id).unwrap();
    assert_eq!(about_edges.len(), 1);
    assert_eq!(about_edges[0].to_page, Some(home.id));
    assert_eq!(about_edges[0].anchor.as_deref(), Some("Home"));
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let service = CrawlService::from_config(create_test_config(&dir, 300)).unwrap();
    let seeds = vec![format!("{}/", base_url)];

    service.start(2, seeds.clone()).unwrap().wait().await.unwrap();
    let (pages_before, edges_before, home_id) = {
        let storage = service.storage();
        let storage = storage.lock().unwrap();
        (
            storage.count_pages(2).unwrap(),
            storage.count_edges(2).unwrap(),
            storage.page_id_by_url(2, &seeds[0]).unwrap().unwrap(),
        )
    };

    service.start(2, seeds.clone()).unwrap().wait().await.unwrap();

    let storage = service.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_pages(2).unwrap(), pages_before);
    assert_eq!(storage.count_edges(2).unwrap(), edges_before);
    assert_eq!(storage.page_id_by_url(2, &seeds[0]).unwrap(), Some(home_id));

    // Every target now exists, so the second pass resolves home's edges
    let home_edges = storage.outgoing_edges(home_id).unwrap();
    assert!(home_edges.iter().all(|e| e.to_page.is_some()));
}

#[tokio::test]
async fn test_recrawl_removes_stale_edges() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_page(
        &mock_server,
        "/",
        r#"<a href="/old">Old</a><a href="/kept">Kept</a>"#,
    )
    .await;
    mount_page(&mock_server, "/old", "<p>old</p>").await;
    mount_page(&mock_server, "/kept", "<p>kept</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let service = CrawlService::from_config(create_test_config(&dir, 300)).unwrap();
    let seeds = vec![format!("{}/", base_url)];

    service.start(3, seeds.clone()).unwrap().wait().await.unwrap();

    // The site changes: /old is no longer linked
    mock_server.reset().await;
    mount_page(&mock_server, "/", r#"<a href="/kept">Kept</a>"#).await;
    mount_page(&mock_server, "/kept", "<p>kept</p>").await;

    service.start(3, seeds.clone()).unwrap().wait().await.unwrap();

    let storage = service.storage();
    let storage = storage.lock().unwrap();
    let home_id = storage.page_id_by_url(3, &seeds[0]).unwrap().unwrap();
    let targets: Vec<String> = storage
        .outgoing_edges(home_id)
        .unwrap()
        .into_iter()
        .map(|e| e.to_url)
        .collect();
    assert_eq!(targets, vec![format!("{}/kept", base_url)]);

    // The old page itself is never deleted
    assert!(storage
        .page_id_by_url(3, &format!("{}/old", base_url))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_status_lifecycle() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<title>Slow</title>")
                .insert_header("content-type", "text/html")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let service = CrawlService::from_config(create_test_config(&dir, 0)).unwrap();

    assert_eq!(service.get_status(4).unwrap().status, CrawlStatus::Pending);

    let accepted = service.start(4, vec![format!("{}/", base_url)]).unwrap();

    let running = service.get_status(4).unwrap();
    assert_eq!(running.status, CrawlStatus::Running);
    assert!(running.is_running);
    assert_eq!(running.total_pages, 0);

    accepted.wait().await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let done = service.get_status(4).unwrap();
    assert!(!done.is_running);
    assert_eq!(done.total_pages, 1);
    assert_eq!(done.status, CrawlStatus::Completed);
    assert!(done.last_crawled_at.is_some());
}

#[tokio::test]
async fn test_projects_are_isolated() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let service = CrawlService::from_config(create_test_config(&dir, 300)).unwrap();

    let first = service.start(10, vec![format!("{}/", base_url)]).unwrap();
    let second = service
        .start(20, vec![format!("{}/about", base_url)])
        .unwrap();
    assert_eq!(service.registry().running_projects(), vec![10, 20]);

    let (a, b) = tokio::join!(first.wait(), second.wait());
    assert_eq!(a.unwrap().pages_saved, 3);
    assert_eq!(b.unwrap().pages_saved, 3);

    assert!(service.registry().running_projects().is_empty());
    assert_eq!(service.list_pages(10, 100, 0).unwrap().total, 3);
    assert_eq!(service.list_pages(20, 100, 0).unwrap().total, 3);

    let page_ids_10: Vec<i64> = service
        .list_pages(10, 100, 0)
        .unwrap()
        .items
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert!(service
        .list_pages(20, 100, 0)
        .unwrap()
        .items
        .iter()
        .all(|p| !page_ids_10.contains(&p.id)));
}

#[tokio::test]
async fn test_request_cap_override_beats_config() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let service = CrawlService::from_config(create_test_config(&dir, 300)).unwrap();

    let accepted = service
        .start_with(7, vec![format!("{}/", base_url)], Some(1))
        .unwrap();
    assert_eq!(accepted.max_requests, 1);
    let summary = accepted.wait().await.unwrap();

    assert_eq!(summary.pages_saved, 1);
    let listing = service.list_pages(7, 100, 0).unwrap();
    assert_eq!(listing.total, 1);
    assert_eq!(listing.items[0].url, format!("{}/", base_url));

    // Zero falls back to the configured cap
    let accepted = service
        .start_with(8, vec![format!("{}/", base_url)], Some(0))
        .unwrap();
    assert_eq!(accepted.max_requests, 50);
    assert_eq!(accepted.wait().await.unwrap().pages_saved, 3);
}

#[tokio::test]
async fn test_invalid_start_url_fails_job() {
    let dir = tempfile::tempdir().unwrap();
    let service = CrawlService::from_config(create_test_config(&dir, 300)).unwrap();

    let accepted = service.start(5, vec!["ftp://example.com/".to_string()]).unwrap();
    let result = accepted.wait().await;

    assert!(matches!(result, Err(SiteGraphError::Url(_))));
    assert!(!service.registry().is_running(5));
    assert_eq!(service.get_status(5).unwrap().status, CrawlStatus::Pending);
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_site(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    {
        let service = CrawlService::from_config(create_test_config(&dir, 300)).unwrap();
        service
            .start(6, vec![format!("{}/", base_url)])
            .unwrap()
            .wait()
            .await
            .unwrap();
    }

    let service = CrawlService::from_config(create_test_config(&dir, 0)).unwrap();
    let report = service.get_status(6).unwrap();
    assert_eq!(report.total_pages, 3);
    assert!(!report.is_running);
}
