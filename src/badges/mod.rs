//! Availability badges ("STREAMING", "PREFERRED", "RENT/BUY") are injected
//! by client-side script, so they only exist in a rendered page.

pub mod chrome;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{title_url, Settings};
use crate::pacing::Delay;

pub use chrome::ChromeRenderer;

/// Card logos under a STREAMING / PREFERRED / RENT/BUY label.
pub const CARD_XPATH: &str = r#"//div[@data-testid="tm-box-woc-text" and (text()="STREAMING" or text()="PREFERRED" or text()="RENT/BUY")]/parent::div//img"#;
/// Small row-level provider icon shown on some titles.
pub const ROW_ICON_XPATH: &str = r#"//div[@data-testid="tm-box-update-row"]//img"#;

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    /// XPath that must match at least once before collecting.
    pub wait_for: String,
    /// XPath queries whose image `src` values are collected, in this order.
    pub collect: Vec<String>,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing matched the wait query within {0:?}")]
    Timeout(Duration),
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("browser session failed: {0}")]
    Session(String),
}

/// A browser engine able to render a page in a fresh, isolated session.
/// Implementations must release the session before returning.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<Vec<String>, RenderError>;
}

pub struct BadgeExtractor {
    renderer: Arc<dyn Renderer>,
    base_url: String,
    timeout: Duration,
    cooldown: Duration,
    delay: Arc<dyn Delay>,
}

impl BadgeExtractor {
    pub fn new(settings: &Settings, renderer: Arc<dyn Renderer>, delay: Arc<dyn Delay>) -> Self {
        BadgeExtractor {
            renderer,
            base_url: settings.base_url.clone(),
            timeout: settings.pacing.render_timeout(),
            cooldown: settings.pacing.after_render(),
            delay,
        }
    }

    /// Unique badge image URLs in first-seen order. Never fails: rendering
    /// problems yield an empty list. The cooldown runs on every path.
    pub async fn extract_badges(&self, id: &str) -> Vec<String> {
        let request = RenderRequest {
            url: title_url(&self.base_url, id),
            wait_for: CARD_XPATH.to_string(),
            collect: vec![CARD_XPATH.to_string(), ROW_ICON_XPATH.to_string()],
            timeout: self.timeout,
        };
        debug!("Opening for badges: {}", request.url);

        let badges = match self.renderer.render(&request).await {
            Ok(srcs) => unique_in_order(srcs),
            Err(RenderError::Timeout(_)) => {
                debug!("No badges rendered for {}", id);
                Vec::new()
            }
            Err(e) => {
                warn!("Badge extraction failed for {}: {}", id, e);
                Vec::new()
            }
        };
        debug!("Found {} badge(s) for {}", badges.len(), id);

        self.delay.wait(self.cooldown).await;
        badges
    }
}

fn unique_in_order(srcs: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    srcs.into_iter()
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
