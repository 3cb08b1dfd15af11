//! Integration tests for the crawler
//!
//! These tests drive the crawl engine and the screenshot cache against an
//! in-memory browser serving canned pages.

use manualforge::browser::{BrowserSession, FixtureBrowser, FixturePage};
use manualforge::config::{CrawlerConfig, ScreenshotConfig};
use manualforge::crawler::CrawlEngine;
use manualforge::screenshot::{CaptureRequest, ScreenshotCache};
use std::time::Duration;
use tempfile::TempDir;

/// Creates a crawler configuration with the delays switched off
fn create_test_config(start_url: &str, max_depth: u32) -> CrawlerConfig {
    let mut config = CrawlerConfig::for_start_url(start_url);
    config.max_depth = max_depth;
    config.page_delay_ms = 0;
    config.element_delay_ms = 0;
    config.navigation_timeout_ms = 1_000;
    config
}

fn screenshot_config(dir: &TempDir) -> ScreenshotConfig {
    ScreenshotConfig {
        enabled: true,
        cache_dir: dir.path().join("screenshots"),
        cache_file: dir.path().join("screenshots/cache.json"),
        ttl_secs: 3600,
        max_per_page: 1,
    }
}

fn fan_out_site() -> FixtureBrowser {
    FixtureBrowser::new()
        .with_page(
            "https://app.example.test/",
            FixturePage::with_links("Home", &["/a", "/b", "/c", "/d"]),
        )
        .with_page("https://app.example.test/a", FixturePage::with_links("A", &["/e"]))
        .with_page("https://app.example.test/b", FixturePage::with_links("B", &[]))
        .with_page("https://app.example.test/c", FixturePage::with_links("C", &[]))
        .with_page("https://app.example.test/d", FixturePage::with_links("D", &[]))
        .with_page("https://app.example.test/e", FixturePage::with_links("E", &[]))
}

#[tokio::test]
async fn test_start_page_plus_three_links() {
    let browser = fan_out_site();
    let engine = CrawlEngine::new(
        create_test_config("https://app.example.test/", 1),
        &ScreenshotConfig {
            enabled: false,
            ..Default::default()
        },
    )
    .unwrap();

    let output = engine.run(&browser, None).await;

    assert_eq!(output.visited.len(), 4);
    assert_eq!(output.visited[0], "https://app.example.test/");
    assert_eq!(
        &output.visited[1..],
        &[
            "https://app.example.test/a",
            "https://app.example.test/b",
            "https://app.example.test/c"
        ]
    );
    assert!(!browser.visits().iter().any(|u| u.ends_with("/d")));
    assert!(!browser.visits().iter().any(|u| u.ends_with("/e")));
}

#[tokio::test]
async fn test_off_host_links_ignored() {
    let browser = FixtureBrowser::new()
        .with_page(
            "https://app.example.test/",
            FixturePage::with_links(
                "Home",
                &["https://elsewhere.test/", "mailto:help@example.test", "/help"],
            ),
        )
        .with_page("https://app.example.test/help", FixturePage::with_links("Help", &[]))
        .with_page("https://elsewhere.test/", FixturePage::with_links("Elsewhere", &[]));
    let engine = CrawlEngine::new(
        create_test_config("https://app.example.test/", 2),
        &ScreenshotConfig {
            enabled: false,
            ..Default::default()
        },
    )
    .unwrap();

    let output = engine.run(&browser, None).await;
    assert_eq!(
        output.visited,
        vec!["https://app.example.test/", "https://app.example.test/help"]
    );
}

#[tokio::test]
async fn test_second_crawl_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let config = screenshot_config(&dir);
    let browser = fan_out_site();

    let mut cache = ScreenshotCache::open(&config).unwrap();
    let first = CrawlEngine::new(create_test_config("https://app.example.test/", 1), &config)
        .unwrap()
        .run(&browser, Some(&mut cache))
        .await;
    let captured = browser.screenshot_count();
    assert_eq!(captured, 4);
    assert_eq!(first.stats.screenshots_reused, 0);

    // Reopen from disk to check the index survived
    drop(cache);
    let mut cache = ScreenshotCache::open(&config).unwrap();
    let second = CrawlEngine::new(create_test_config("https://app.example.test/", 1), &config)
        .unwrap()
        .run(&browser, Some(&mut cache))
        .await;

    assert_eq!(browser.screenshot_count(), captured);
    assert_eq!(second.stats.screenshots_reused, 4);
    assert!(second
        .pages
        .iter()
        .flat_map(|p| &p.screenshots)
        .all(|s| s.from_cache));
}

#[tokio::test]
async fn test_identical_pages_share_one_file() {
    let dir = TempDir::new().unwrap();
    let config = screenshot_config(&dir);
    let browser = FixtureBrowser::new()
        .with_page(
            "https://app.example.test/one",
            FixturePage::new("One", "<p>same</p>").with_screenshot(b"identical-bytes"),
        )
        .with_page(
            "https://app.example.test/two",
            FixturePage::new("Two", "<p>same</p>").with_screenshot(b"identical-bytes"),
        );
    let mut cache = ScreenshotCache::open(&config).unwrap();
    let timeout = Duration::from_secs(1);

    browser.goto("https://app.example.test/one", timeout).await.unwrap();
    let one = cache
        .capture(
            &browser,
            &CaptureRequest::full_page("https://app.example.test/one", browser.viewport()),
        )
        .await
        .unwrap();

    browser.goto("https://app.example.test/two", timeout).await.unwrap();
    let two = cache
        .capture(
            &browser,
            &CaptureRequest::full_page("https://app.example.test/two", browser.viewport()),
        )
        .await
        .unwrap();

    assert!(!one.duplicate);
    assert!(two.duplicate);
    assert!(!two.from_cache);
    assert_eq!(one.path, two.path);
    assert_eq!(cache.len(), 1);

    let png_files = std::fs::read_dir(&config.cache_dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "png"))
        .count();
    assert_eq!(png_files, 1);
}

#[tokio::test]
async fn test_optimize_evicts_missing_files() {
    let dir = TempDir::new().unwrap();
    let config = screenshot_config(&dir);
    let browser = fan_out_site();
    let mut cache = ScreenshotCache::open(&config).unwrap();

    browser
        .goto("https://app.example.test/a", Duration::from_secs(1))
        .await
        .unwrap();
    let outcome = cache
        .capture(
            &browser,
            &CaptureRequest::full_page("https://app.example.test/a", browser.viewport()),
        )
        .await
        .unwrap();
    std::fs::remove_file(&outcome.path).unwrap();

    let report = cache.optimize().unwrap();
    assert_eq!(report.missing_files, 1);
    assert_eq!(report.remaining, 0);
    assert!(cache.is_empty());
}
