use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use newsreel_core::error::AppError;
use newsreel_core::traits::Fetcher;

/// Rendering backend: fetches a page through headless Chromium so
/// script-built markup is present before extraction.
///
/// Each `fetch` launches a dedicated browser session and closes it on
/// every exit path — success, render error, or timeout — before
/// returning, so a run holds at most one live session at a time and a
/// crashed render cannot leak a Chromium process into the next source.
#[derive(Clone)]
pub struct BrowserFetcher {
    timeout: Duration,
}

impl BrowserFetcher {
    /// Default 30 second deadline covering launch, navigation, and render.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn launch() -> Result<(Browser, tokio::task::JoinHandle<()>), AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();

        if let Some(bin) = find_chrome_binary() {
            tracing::debug!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--window-size=1920,1080")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection
        // to work; the task ends when the browser closes.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok((browser, handler_task))
    }

    async fn render(browser: &Browser, url: &str) -> Result<String, AppError> {
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to navigate to {url}: {e}")))?;

        // <body> present is the base DOM marker that the page has
        // rendered its main content.
        page.find_element("body")
            .await
            .map_err(|e| AppError::BrowserError(format!("Page did not render body: {e}")))?;

        page.content()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to read page content: {e}")))
    }
}

impl Default for BrowserFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let deadline = self.timeout;
        let (mut browser, handler_task) = Self::launch().await?;

        let result = tokio::time::timeout(deadline, Self::render(&browser, url)).await;

        // Release the session before reporting anything. close() asks
        // Chromium to exit; wait() reaps the process.
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "Failed to close browser session");
        }
        if let Err(e) = browser.wait().await {
            tracing::warn!(error = %e, "Failed to reap browser process");
        }
        handler_task.abort();

        match result {
            Ok(inner) => inner,
            Err(_) => Err(AppError::Timeout(deadline.as_secs())),
        }
    }
}

/// Locate a usable Chrome/Chromium binary.
///
/// `CHROME_BIN` wins when set. The snap wrapper on Ubuntu strips the
/// headless CLI flags, so the real binary inside the snap is preferred
/// over `/snap/bin/chromium`. Returning `None` lets chromiumoxide do
/// its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    let candidates: &[&str] = &[
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}
