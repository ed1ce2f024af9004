use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use sumi_swarm::config::{Config, CrawlerConfig, FetchConfig};
use sumi_swarm::crawler::Coordinator;
use sumi_swarm::store::{MemoryStore, SharedStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with a short poll interval
fn create_test_config(workers: usize) -> Config {
    Config {
        crawler: CrawlerConfig {
            workers,
            poll_interval_ms: 10,
            release_on_store_failure: false,
        },
        fetch: FetchConfig {
            timeout_secs: 5,
            connect_timeout_secs: 2,
        },
        ..Config::default()
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .expect(1)
        .mount(server)
        .await;
}

fn sorted(mut urls: Vec<String>) -> Vec<String> {
    urls.sort();
    urls
}

async fn run_crawl(store: Arc<MemoryStore>, workers: usize, seed: &str) {
    let config = create_test_config(workers);
    let coordinator =
        Coordinator::from_config(&config, store).expect("Failed to create coordinator");
    coordinator.seed(seed).await.expect("Failed to seed");

    let report = tokio::time::timeout(Duration::from_secs(30), coordinator.run_n(workers))
        .await
        .expect("Crawl did not terminate")
        .expect("Crawl failed");
    assert_eq!(report.failed_workers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<html><head><title>Home</title></head><body>
            <a href="/page1">Page 1</a>
            <a href="page2?b=2&amp;a=1#top">Page 2</a>
            <a href="https://external.example.org/elsewhere">External</a>
            <img src="/img/logo.png">
            </body></html>"#
            .to_string(),
    )
    .await;

    mount_page(
        &mock_server,
        "/page1",
        format!(
            r#"<html><body>
            <a href="{}/">Home</a>
            <a href="{}//page2?a=1&b=2">Page 2 again</a>
            <img src="https://cdn.example.org/photo.jpg">
            </body></html>"#,
            base_url, base_url
        ),
    )
    .await;

    mount_page(
        &mock_server,
        "/page2",
        r#"<html><body><a href="/page1">Back</a><img src="/img/logo.png"></body></html>"#
            .to_string(),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    run_crawl(store.clone(), 3, &format!("{}/", base_url)).await;

    let visited = sorted(store.visited().await.unwrap());
    assert_eq!(
        visited,
        vec![
            format!("{}/", base_url),
            format!("{}/page1", base_url),
            format!("{}/page2?a=1&b=2", base_url),
        ]
    );

    let images = sorted(store.image_results().await.unwrap());
    assert_eq!(
        images,
        vec![
            format!("{}/img/logo.png", base_url),
            "https://cdn.example.org/photo.jpg".to_string(),
        ]
    );

    assert_eq!(store.get_active().await.unwrap(), 0);
    // Each page fetched exactly once; wiremock verifies `expect(1)` on drop
}

#[tokio::test]
async fn test_non_html_pages_skipped() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<a href="/report.pdf">Report</a><a href="/page">Page</a>"#.to_string(),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"<a href="/hidden">not html</a>"#, "application/pdf"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    mount_page(&mock_server, "/page", "<p>leaf</p>".to_string()).await;

    Mock::given(method("GET"))
        .and(path("/hidden"))
        .respond_with(html("<p>should never be reached</p>".to_string()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::new());
    run_crawl(store.clone(), 1, &format!("{}/", base_url)).await;

    let visited: HashSet<String> = store.visited().await.unwrap().into_iter().collect();
    assert_eq!(visited.len(), 3);
    assert!(visited.contains(&format!("{}/report.pdf", base_url)));
    assert!(!visited.contains(&format!("{}/hidden", base_url)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_failures_do_not_stop_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"
            <a href="/broken">Broken</a>
            <a href="http://127.0.0.1:1/unreachable">Same host, dead port</a>
            <a href="/fine">Fine</a>
        "#
        .to_string(),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    mount_page(&mock_server, "/fine", r#"<img src="/fine.png">"#.to_string()).await;

    let store = Arc::new(MemoryStore::new());
    run_crawl(store.clone(), 2, &format!("{}/", base_url)).await;

    let visited: HashSet<String> = store.visited().await.unwrap().into_iter().collect();
    assert_eq!(visited.len(), 4);
    assert!(visited.contains(&"http://127.0.0.1:1/unreachable".to_string()));
    assert_eq!(
        store.image_results().await.unwrap(),
        vec![format!("{}/fine.png", base_url)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_coordinators_share_one_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let pages = 12;
    for i in 0..pages {
        let next = (i + 1) % pages;
        let skip = (i + 5) % pages;
        mount_page(
            &mock_server,
            &format!("/n{}", i),
            format!(
                r#"<a href="/n{}">next</a><a href="/n{}">skip</a><img src="/i{}.gif">"#,
                next, skip, i
            ),
        )
        .await;
    }

    // Two independent coordinators stand in for two processes sharing a store
    let store = Arc::new(MemoryStore::new());
    let config = create_test_config(2);
    let first = Coordinator::from_config(&config, store.clone()).unwrap();
    let second = Coordinator::from_config(&config, store.clone()).unwrap();

    first.seed(&format!("{}/n0", base_url)).await.unwrap();
    second.seed(&format!("{}/n0", base_url)).await.unwrap();

    let (a, b) = tokio::time::timeout(Duration::from_secs(30), async {
        tokio::join!(first.run_n(2), second.run_n(2))
    })
    .await
    .expect("Crawl did not terminate");

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(
        a.totals().pages_extracted + b.totals().pages_extracted,
        pages as u64
    );
    assert_eq!(store.visited().await.unwrap().len(), pages);
    assert_eq!(store.image_results().await.unwrap().len(), pages);
}
