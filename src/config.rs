//! Runtime settings: built-in defaults, then an optional `enricher.toml`,
//! then `ENRICHER_*` environment variables (`__` separates nested keys).

use std::time::Duration;

use config::{Config, ConfigError, Environment, File, Source};
use serde::Deserialize;

const CONFIG_FILE: &str = "enricher";
const ENV_PREFIX: &str = "ENRICHER";

pub const DEFAULT_BASE_URL: &str = "https://www.imdb.com/title/";
pub const DEFAULT_ID_COLUMN: &str = "Const";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
const SIMPLE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Title pages live at `{base_url}{id}/`.
    pub base_url: String,
    pub id_column: String,
    pub cast_limit: usize,
    pub headless: bool,
    /// Browser binary for badge rendering; auto-detected when unset.
    pub chrome_path: Option<String>,
    pub http: HttpSettings,
    pub certification: CertificationSettings,
    pub pacing: Pacing,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: DEFAULT_BASE_URL.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            cast_limit: 5,
            headless: false,
            chrome_path: None,
            http: HttpSettings::default(),
            certification: CertificationSettings::default(),
            pacing: Pacing::default(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_sources(File::with_name(CONFIG_FILE).required(false), environment())
    }

    /// Layers `file` then `env` over the built-in defaults.
    fn from_sources<F>(file: F, env: Environment) -> Result<Self, ConfigError>
    where
        F: Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// Defaults pointed at a mock server, with every politeness wait zeroed.
    #[cfg(test)]
    pub fn for_tests(base_url: &str) -> Self {
        Settings {
            base_url: base_url.to_string(),
            pacing: Pacing::none(),
            ..Settings::default()
        }
    }
}

/// Header set and retry policy of the document fetcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub referer: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    /// Ceiling for any single retry wait, computed or advertised.
    pub max_retry_after_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            user_agent: BROWSER_USER_AGENT.to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
                .to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
            referer: "https://www.imdb.com/".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 2000,
            max_retry_after_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CertificationSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for CertificationSettings {
    fn default() -> Self {
        CertificationSettings {
            user_agent: SIMPLE_USER_AGENT.to_string(),
            timeout_secs: 10,
        }
    }
}

/// Politeness delays between outbound requests and browser sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub after_fetch_ms: u64,
    pub after_render_ms: u64,
    pub after_row_ms: u64,
    pub render_timeout_secs: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing {
            after_fetch_ms: 2000,
            after_render_ms: 5000,
            after_row_ms: 1000,
            render_timeout_secs: 15,
        }
    }
}

impl Pacing {
    /// No politeness waits at all. Render timeout is kept.
    #[cfg(test)]
    pub fn none() -> Self {
        Pacing {
            after_fetch_ms: 0,
            after_render_ms: 0,
            after_row_ms: 0,
            ..Pacing::default()
        }
    }

    pub fn after_fetch(&self) -> Duration {
        Duration::from_millis(self.after_fetch_ms)
    }

    pub fn after_render(&self) -> Duration {
        Duration::from_millis(self.after_render_ms)
    }

    pub fn after_row(&self) -> Duration {
        Duration::from_millis(self.after_row_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

pub fn title_url(base_url: &str, id: &str) -> String {
    format!("{}/{}/", base_url.trim_end_matches('/'), id)
}
