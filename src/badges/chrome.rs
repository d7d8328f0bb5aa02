use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time::Instant;
use tracing::debug;

use super::{RenderError, RenderRequest, Renderer};
use crate::config::Settings;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
// Navigation itself may take this long on top of the wait-for-element bound.
const NAVIGATION_GRACE: Duration = Duration::from_secs(30);

/// Launches a fresh Chrome/Chromium process per render and tears it down
/// before returning, whatever happened in between.
pub struct ChromeRenderer {
    headless: bool,
    executable: Option<PathBuf>,
}

impl ChromeRenderer {
    pub fn new(settings: &Settings) -> Self {
        ChromeRenderer {
            headless: settings.headless,
            executable: settings.chrome_path.as_ref().map(PathBuf::from),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--start-maximized")
            .viewport(None);
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(RenderError::Launch)
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<String>, RenderError> {
        let config = self.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        let bound = request.timeout + NAVIGATION_GRACE;
        let result = match tokio::time::timeout(bound, collect_images(&browser, request)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout(bound)),
        };

        if let Err(e) = browser.close().await {
            debug!("Browser close failed, killing process: {}", e);
            if let Some(Err(e)) = browser.kill().await {
                debug!("Browser kill failed: {}", e);
            }
        }
        if let Err(e) = browser.wait().await {
            debug!("Waiting for browser exit failed: {}", e);
        }
        handler_task.abort();

        result
    }
}

async fn collect_images(browser: &Browser, request: &RenderRequest) -> Result<Vec<String>, RenderError> {
    let page = browser.new_page(request.url.as_str()).await.map_err(session)?;
    wait_for_match(&page, &request.wait_for, request.timeout).await?;

    let mut srcs = Vec::new();
    for xpath in &request.collect {
        let found: Vec<String> = page
            .evaluate(image_sources_script(xpath))
            .await
            .map_err(session)?
            .into_value()
            .map_err(session)?;
        srcs.extend(found);
    }
    Ok(srcs)
}

async fn wait_for_match(page: &Page, xpath: &str, timeout: Duration) -> Result<(), RenderError> {
    let deadline = Instant::now() + timeout;
    loop {
        let count: u64 = page
            .evaluate(match_count_script(xpath))
            .await
            .map_err(session)?
            .into_value()
            .map_err(session)?;
        if count > 0 {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RenderError::Timeout(timeout));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn session(e: impl std::fmt::Display) -> RenderError {
    RenderError::Session(e.to_string())
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_default()
}

fn match_count_script(xpath: &str) -> String {
    format!(
        "document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength",
        js_string(xpath)
    )
}

/// Resolved `src` of every element the XPath selects, in document order.
fn image_sources_script(xpath: &str) -> String {
    format!(
        r#"(() => {{
    const found = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    const out = [];
    for (let i = 0; i < found.snapshotLength; i++) {{
        const el = found.snapshotItem(i);
        const src = el.src || el.getAttribute("src");
        if (src) out.push(src);
    }}
    return out;
}})()"#,
        js_string(xpath)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badges::CARD_XPATH;

    #[test]
    fn xpath_is_embedded_as_js_literal() {
        let script = match_count_script(CARD_XPATH);
        assert!(script.starts_with(r#"document.evaluate("//div[@data-testid=\"tm-box-woc-text\""#));
        assert!(script.ends_with(".snapshotLength"));
    }

    #[test]
    fn source_script_is_an_iife() {
        let script = image_sources_script("//img");
        assert!(script.starts_with("(() => {"));
        assert!(script.contains(r#"document.evaluate("//img""#));
        assert!(script.ends_with("})()"));
    }

    #[test]
    fn headed_by_default() {
        let renderer = ChromeRenderer::new(&Settings::default());
        assert!(!renderer.headless);
        assert!(renderer.executable.is_none());
    }
}
