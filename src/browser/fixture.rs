use super::snapshot::{DomSnapshot, SNAPSHOT_SCRIPT};
use super::{BrowserError, BrowserSession, DomNode, Rect, ScreenshotOptions, Viewport};
use crate::url::normalize_url;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A canned page served by [`FixtureBrowser`]
#[derive(Debug, Clone, Default)]
pub struct FixturePage {
    pub title: String,
    pub html: String,
    /// Nodes returned by the snapshot script for this page
    pub nodes: Vec<DomNode>,
    /// Bytes returned by a full-page screenshot
    pub screenshot: Vec<u8>,
    /// Navigation to this page times out
    pub unreachable: bool,
}

impl FixturePage {
    pub fn new(title: &str, html: &str) -> Self {
        Self {
            title: title.to_string(),
            html: html.to_string(),
            screenshot: format!("png:{}", title).into_bytes(),
            ..Default::default()
        }
    }

    /// A page whose body is just the given links
    pub fn with_links(title: &str, hrefs: &[&str]) -> Self {
        let anchors: String = hrefs
            .iter()
            .map(|href| format!("<a href=\"{}\">{}</a>", href, href))
            .collect();
        Self::new(
            title,
            &format!(
                "<html><head><title>{}</title></head><body>{}</body></html>",
                title, anchors
            ),
        )
    }

    pub fn with_nodes(mut self, nodes: Vec<DomNode>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_screenshot(mut self, bytes: &[u8]) -> Self {
        self.screenshot = bytes.to_vec();
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }
}

#[derive(Debug, Clone)]
struct FixtureLogin {
    username: String,
    password: String,
    landing_url: String,
}

#[derive(Debug, Default)]
struct FixtureState {
    pages: HashMap<String, FixturePage>,
    redirects: HashMap<String, String>,
    current: Option<String>,
    visits: Vec<String>,
    screenshots: usize,
    fields: HashMap<String, String>,
    login: Option<FixtureLogin>,
    closed: bool,
}

/// In-memory browser serving canned pages
///
/// Used by the test suite and for dry runs against a recorded site map. Pages
/// are keyed by normalized URL; selectors are matched against the page HTML
/// with `scraper`, so `wait_for`, `click` and `fill` behave like a real page.
#[derive(Debug)]
pub struct FixtureBrowser {
    state: Mutex<FixtureState>,
    viewport: Viewport,
}

impl Default for FixtureBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureBrowser {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FixtureState::default()),
            viewport: Viewport::default(),
        }
    }

    pub fn with_page(self, url: &str, page: FixturePage) -> Self {
        self.insert_page(url, page);
        self
    }

    pub fn with_redirect(self, from: &str, to: &str) -> Self {
        {
            let mut state = self.lock();
            state.redirects.insert(page_key(from), page_key(to));
        }
        self
    }

    /// Accepts `username`/`password` typed into the page's text and password
    /// inputs and lands on `landing_url` when the submit button is clicked
    pub fn with_login(self, username: &str, password: &str, landing_url: &str) -> Self {
        {
            let mut state = self.lock();
            state.login = Some(FixtureLogin {
                username: username.to_string(),
                password: password.to_string(),
                landing_url: page_key(landing_url),
            });
        }
        self
    }

    /// Adds or replaces a page, e.g. to simulate a changed screen between runs
    pub fn insert_page(&self, url: &str, page: FixturePage) {
        self.lock().pages.insert(page_key(url), page);
    }

    /// Every URL requested through `goto`, in order
    pub fn visits(&self) -> Vec<String> {
        self.lock().visits.clone()
    }

    /// Number of screenshots taken so far
    pub fn screenshot_count(&self) -> usize {
        self.lock().screenshots
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FixtureState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn with_current<T>(
        &self,
        f: impl FnOnce(&mut FixtureState, &str, &FixturePage) -> Result<T, BrowserError>,
    ) -> Result<T, BrowserError> {
        let mut state = self.lock();
        if state.closed {
            return Err(BrowserError::Closed);
        }
        let current = state
            .current
            .clone()
            .ok_or_else(|| BrowserError::Script("no page loaded".to_string()))?;
        let page = state
            .pages
            .get(&current)
            .cloned()
            .ok_or_else(|| BrowserError::Script(format!("page {} vanished", current)))?;
        f(&mut *state, &current, &page)
    }
}

#[async_trait]
impl BrowserSession for FixtureBrowser {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.lock();
        if state.closed {
            return Err(BrowserError::Closed);
        }
        state.visits.push(url.to_string());

        let mut key = page_key(url);
        if let Some(target) = state.redirects.get(&key) {
            key = target.clone();
        }

        match state.pages.get(&key).map(|page| page.unreachable) {
            Some(true) => Err(BrowserError::Timeout {
                what: format!("navigation to {}", url),
                timeout_ms: timeout.as_millis() as u64,
            }),
            Some(false) => {
                state.current = Some(key);
                state.fields.clear();
                Ok(())
            }
            None => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "404 Not Found".to_string(),
            }),
        }
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.with_current(|_, url, _| Ok(url.to_string()))
    }

    async fn title(&self) -> Result<String, BrowserError> {
        self.with_current(|_, _, page| Ok(page.title.clone()))
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.with_current(|_, _, page| Ok(page.html.clone()))
    }

    async fn evaluate(&self, script: &str, _args: Vec<Value>) -> Result<Value, BrowserError> {
        let viewport = self.viewport;
        self.with_current(|_, _, page| {
            if script != SNAPSHOT_SCRIPT {
                return Ok(Value::Null);
            }
            let snapshot = DomSnapshot {
                viewport,
                nodes: page.nodes.clone(),
            };
            serde_json::to_value(snapshot).map_err(|e| BrowserError::Script(e.to_string()))
        })
    }

    async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>, BrowserError> {
        self.with_current(|state, _, page| {
            let mut bytes = page.screenshot.clone();
            if let Some(selector) = &options.selector {
                if !matches_selector(&page.html, selector) {
                    return Err(BrowserError::ElementNotFound(selector.clone()));
                }
                bytes.extend_from_slice(b"#");
                bytes.extend_from_slice(selector.as_bytes());
            }
            state.screenshots += 1;
            Ok(bytes)
        })
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError> {
        self.with_current(|_, _, page| require_match(&page.html, selector))
    }

    async fn bounding_box(&self, selector: &str) -> Result<Option<Rect>, BrowserError> {
        self.with_current(|_, _, page| {
            Ok(matches_selector(&page.html, selector).then(|| Rect::new(0.0, 0.0, 120.0, 32.0)))
        })
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.with_current(|_, _, page| {
            if matches_selector(&page.html, selector) {
                Ok(())
            } else {
                Err(BrowserError::Timeout {
                    what: format!("selector '{}'", selector),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        })
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.with_current(|state, _, page| {
            require_match(&page.html, selector)?;
            state.fields.insert(selector.to_string(), value.to_string());
            Ok(())
        })
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.with_current(|state, _, page| {
            require_match(&page.html, selector)?;
            let Some(login) = state.login.clone() else {
                return Ok(());
            };
            let typed: Vec<&String> = state.fields.values().collect();
            let accepted = typed.contains(&&login.username) && typed.contains(&&login.password);
            if accepted && state.pages.contains_key(&login.landing_url) {
                state.current = Some(login.landing_url);
                state.fields.clear();
            }
            Ok(())
        })
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.closed = true;
        state.current = None;
        Ok(())
    }
}

fn page_key(url: &str) -> String {
    normalize_url(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

fn matches_selector(html: &str, selector: &str) -> bool {
    let Ok(parsed) = Selector::parse(selector) else {
        return false;
    };
    let document = Html::parse_document(html);
    let found = document.select(&parsed).next().is_some();
    found
}

fn require_match(html: &str, selector: &str) -> Result<(), BrowserError> {
    if matches_selector(html, selector) {
        Ok(())
    } else {
        Err(BrowserError::ElementNotFound(selector.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn login_page() -> FixturePage {
        FixturePage::new(
            "Sign in",
            r#"<form><input type="text" name="username"><input type="password">
            <button type="submit">Sign in</button></form>"#,
        )
    }

    #[tokio::test]
    async fn test_goto_known_and_unknown_pages() {
        let browser = FixtureBrowser::new()
            .with_page("https://example.test/", FixturePage::with_links("Home", &["/a"]));

        browser.goto("https://example.test/", TIMEOUT).await.unwrap();
        assert_eq!(browser.title().await.unwrap(), "Home");
        assert!(browser.page_source().await.unwrap().contains("href=\"/a\""));

        let missing = browser.goto("https://example.test/missing", TIMEOUT).await;
        assert!(matches!(missing, Err(BrowserError::Navigation { .. })));
        assert_eq!(browser.visits().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_page_times_out() {
        let browser = FixtureBrowser::new().with_page(
            "https://example.test/slow",
            FixturePage::new("Slow", "<p></p>").unreachable(),
        );
        let result = browser.goto("https://example.test/slow", TIMEOUT).await;
        assert!(matches!(result, Err(BrowserError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_login_flow_lands_on_dashboard() {
        let browser = FixtureBrowser::new()
            .with_page("https://example.test/login", login_page())
            .with_page("https://example.test/home", FixturePage::new("Home", "<main id=\"dash\"></main>"))
            .with_login("alice", "secret", "https://example.test/home");

        browser.goto("https://example.test/login", TIMEOUT).await.unwrap();
        browser.fill("input[name='username']", "alice").await.unwrap();
        browser.fill("input[type='password']", "secret").await.unwrap();
        browser.click("button[type='submit']").await.unwrap();

        assert_eq!(browser.current_url().await.unwrap(), "https://example.test/home");
        browser.wait_for("#dash", TIMEOUT).await.unwrap();
    }

    #[tokio::test]
    async fn test_element_screenshot_requires_match() {
        let browser = FixtureBrowser::new().with_page("https://example.test/", login_page());
        browser.goto("https://example.test/", TIMEOUT).await.unwrap();

        let element = browser
            .screenshot(&ScreenshotOptions::element("button"))
            .await
            .unwrap();
        let page = browser.screenshot(&ScreenshotOptions::full_page()).await.unwrap();
        assert_ne!(element, page);

        let missing = browser.screenshot(&ScreenshotOptions::element("#nope")).await;
        assert!(matches!(missing, Err(BrowserError::ElementNotFound(_))));
        assert_eq!(browser.screenshot_count(), 2);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_calls() {
        let browser = FixtureBrowser::new().with_page("https://example.test/", login_page());
        browser.close().await.unwrap();
        assert!(browser.is_closed());
        assert!(matches!(
            browser.goto("https://example.test/", TIMEOUT).await,
            Err(BrowserError::Closed)
        ));
    }
}
