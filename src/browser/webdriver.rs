use super::{BrowserError, BrowserSession, Rect, ScreenshotOptions, Viewport};
use crate::config::BrowserConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thirtyfour::prelude::*;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Upper bound for commands that carry no caller-supplied timeout
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between element lookups while waiting for a selector
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Tallest window a full-page capture resizes to
const MAX_CAPTURE_HEIGHT: u32 = 16_384;

/// Document size plus the space the window frame takes around the viewport
const PAGE_SIZE_SCRIPT: &str = r#"
const doc = document.documentElement;
const body = document.body || doc;
return {
    width: Math.ceil(Math.max(doc.scrollWidth, body.scrollWidth, window.innerWidth)),
    height: Math.ceil(Math.max(doc.scrollHeight, body.scrollHeight, window.innerHeight)),
    frame_width: Math.max(0, window.outerWidth - window.innerWidth),
    frame_height: Math.max(0, window.outerHeight - window.innerHeight)
};
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
struct PageSize {
    width: u32,
    height: u32,
    frame_width: u32,
    frame_height: u32,
}

/// Window size that shows the whole document inside the viewport
///
/// Never narrower or shorter than the configured viewport; the height is
/// capped at [`MAX_CAPTURE_HEIGHT`].
fn full_page_window(page: PageSize, viewport: Viewport) -> (u32, u32) {
    let width = page.width.max(viewport.width) + page.frame_width;
    let height = page.height.max(viewport.height).min(MAX_CAPTURE_HEIGHT) + page.frame_height;
    (width, height)
}

/// A browser driven over the WebDriver protocol
///
/// Holds one window for the whole run. The driver handle is cloned out of the
/// lock for every command so the lock is never held across a network call.
pub struct WebDriverSession {
    driver: Mutex<Option<WebDriver>>,
    viewport: Viewport,
}

impl WebDriverSession {
    /// Starts a Chrome session on the configured WebDriver endpoint
    pub async fn connect(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let mut caps = DesiredCapabilities::chrome();
        if config.headless {
            caps.set_headless().map_err(driver_error)?;
        }
        caps.add_chrome_arg(&format!(
            "--window-size={},{}",
            config.viewport_width, config.viewport_height
        ))
        .map_err(driver_error)?;
        caps.add_chrome_arg("--disable-dev-shm-usage")
            .map_err(driver_error)?;

        let driver = tokio::time::timeout(
            COMMAND_TIMEOUT,
            WebDriver::new(&config.webdriver_url, caps),
        )
        .await
        .map_err(|_| timeout("WebDriver session", COMMAND_TIMEOUT))?
        .map_err(driver_error)?;

        debug!("Browser session started on {}", config.webdriver_url);

        Ok(Self {
            driver: Mutex::new(Some(driver)),
            viewport: Viewport::new(config.viewport_width, config.viewport_height),
        })
    }

    async fn driver(&self) -> Result<WebDriver, BrowserError> {
        self.driver.lock().await.clone().ok_or(BrowserError::Closed)
    }

    async fn element(&self, selector: &str) -> Result<WebElement, BrowserError> {
        let driver = self.driver().await?;
        let mut found = bounded(
            format!("lookup of '{}'", selector),
            COMMAND_TIMEOUT,
            driver.find_all(By::Css(selector)),
        )
        .await?;
        if found.is_empty() {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        Ok(found.swap_remove(0))
    }

    /// Captures the whole document
    ///
    /// WebDriver screenshots cover the viewport only, so the window is grown
    /// to the document size for the capture and restored afterwards.
    async fn full_page_png(&self) -> Result<Vec<u8>, BrowserError> {
        let driver = self.driver().await?;
        let ret = bounded(
            "page size",
            COMMAND_TIMEOUT,
            driver.execute(PAGE_SIZE_SCRIPT, Vec::new()),
        )
        .await?;
        let page: PageSize = serde_json::from_value(ret.json().clone())
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        let (width, height) = full_page_window(page, self.viewport);
        debug!("Resizing window to {}x{} for a full-page capture", width, height);

        bounded(
            "window resize",
            COMMAND_TIMEOUT,
            driver.set_window_rect(0, 0, width as _, height as _),
        )
        .await?;
        let captured = bounded("screenshot", COMMAND_TIMEOUT, driver.screenshot_as_png()).await;

        let restore = driver.set_window_rect(
            0,
            0,
            (self.viewport.width + page.frame_width) as _,
            (self.viewport.height + page.frame_height) as _,
        );
        if let Err(e) = bounded("window restore", COMMAND_TIMEOUT, restore).await {
            warn!("Could not restore the window size: {}", e);
        }

        captured.map_err(|e| match e {
            BrowserError::Driver(message) => BrowserError::Screenshot(message),
            other => other,
        })
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&self, url: &str, timeout_after: Duration) -> Result<(), BrowserError> {
        let driver = self.driver().await?;
        match tokio::time::timeout(timeout_after, driver.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(timeout(&format!("navigation to {}", url), timeout_after)),
        }
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let driver = self.driver().await?;
        let url = bounded("current URL", COMMAND_TIMEOUT, driver.current_url()).await?;
        Ok(url.to_string())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        let driver = self.driver().await?;
        bounded("page title", COMMAND_TIMEOUT, driver.title()).await
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        let driver = self.driver().await?;
        bounded("page source", COMMAND_TIMEOUT, driver.source()).await
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, BrowserError> {
        let driver = self.driver().await?;
        let ret = tokio::time::timeout(COMMAND_TIMEOUT, driver.execute(script, args))
            .await
            .map_err(|_| timeout("script evaluation", COMMAND_TIMEOUT))?
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(ret.json().clone())
    }

    async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>, BrowserError> {
        let bytes = match &options.selector {
            Some(selector) => {
                let element = self.element(selector).await?;
                tokio::time::timeout(COMMAND_TIMEOUT, element.screenshot_as_png()).await
            }
            None if options.full_page => return self.full_page_png().await,
            None => {
                let driver = self.driver().await?;
                tokio::time::timeout(COMMAND_TIMEOUT, driver.screenshot_as_png()).await
            }
        };

        bytes
            .map_err(|_| timeout("screenshot", COMMAND_TIMEOUT))?
            .map_err(|e| BrowserError::Screenshot(e.to_string()))
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self.element(selector).await?;
        bounded("scroll", COMMAND_TIMEOUT, element.scroll_into_view()).await
    }

    async fn bounding_box(&self, selector: &str) -> Result<Option<Rect>, BrowserError> {
        let element = match self.element(selector).await {
            Ok(element) => element,
            Err(BrowserError::ElementNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let rect = bounded("bounding box", COMMAND_TIMEOUT, element.rect()).await?;
        Ok(Some(Rect::new(rect.x, rect.y, rect.width, rect.height)))
    }

    async fn wait_for(&self, selector: &str, timeout_after: Duration) -> Result<(), BrowserError> {
        let driver = self.driver().await?;
        let poll = async {
            loop {
                match driver.find_all(By::Css(selector)).await {
                    Ok(found) if !found.is_empty() => return Ok::<(), BrowserError>(()),
                    Ok(_) => {}
                    Err(e) => debug!("Lookup of '{}' failed while waiting: {}", selector, e),
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout_after, poll)
            .await
            .map_err(|_| timeout(&format!("selector '{}'", selector), timeout_after))?
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let element = self.element(selector).await?;
        bounded("clear", COMMAND_TIMEOUT, element.clear()).await?;
        bounded("typing", COMMAND_TIMEOUT, element.send_keys(value)).await
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self.element(selector).await?;
        bounded("click", COMMAND_TIMEOUT, element.click()).await
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let driver = self.driver.lock().await.take();
        if let Some(driver) = driver {
            if let Err(e) = driver.quit().await {
                warn!("Error closing browser session: {}", e);
                return Err(driver_error(e));
            }
            debug!("Browser session closed");
        }
        Ok(())
    }
}

async fn bounded<T, F>(
    what: impl Into<String>,
    limit: Duration,
    fut: F,
) -> Result<T, BrowserError>
where
    F: std::future::Future<Output = WebDriverResult<T>>,
{
    let what = what.into();
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| timeout(&what, limit))?
        .map_err(driver_error)
}

fn timeout(what: &str, limit: Duration) -> BrowserError {
    BrowserError::Timeout {
        what: what.to_string(),
        timeout_ms: limit.as_millis() as u64,
    }
}

fn driver_error(e: WebDriverError) -> BrowserError {
    BrowserError::Driver(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(width: u32, height: u32) -> PageSize {
        PageSize {
            width,
            height,
            frame_width: 0,
            frame_height: 85,
        }
    }

    #[test]
    fn test_full_page_window_grows_to_document() {
        let viewport = Viewport::new(1280, 800);
        assert_eq!(full_page_window(page(1280, 4200), viewport), (1280, 4285));
    }

    #[test]
    fn test_full_page_window_never_shrinks_below_viewport() {
        let viewport = Viewport::new(1280, 800);
        assert_eq!(full_page_window(page(900, 300), viewport), (1280, 885));
    }

    #[test]
    fn test_full_page_window_height_capped() {
        let viewport = Viewport::new(1280, 800);
        let (_, height) = full_page_window(page(1280, 90_000), viewport);
        assert_eq!(height, MAX_CAPTURE_HEIGHT + 85);
    }

    #[test]
    fn test_page_size_script_result_decodes() {
        let value = serde_json::json!({
            "width": 1280, "height": 3000, "frame_width": 0, "frame_height": 85
        });
        let size: PageSize = serde_json::from_value(value).unwrap();
        assert_eq!(size, page(1280, 3000));
    }
}
