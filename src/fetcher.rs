use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, REFERER, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::{title_url, Settings};
use crate::error::FetchError;
use crate::pacing::Delay;
use crate::parser::TitlePage;

const RETRY_STATUSES: [u16; 6] = [403, 429, 500, 502, 503, 504];

/// Fetches title documents over one pooled HTTP client.
pub struct PageFetcher {
    client: Client,
    base_url: String,
    max_retries: u32,
    backoff_base: Duration,
    max_retry_after: Duration,
    after_fetch: Duration,
    delay: Arc<dyn Delay>,
}

/// One failed attempt, and whether another is worth making.
struct Failure {
    error: FetchError,
    retryable: bool,
    retry_after: Option<Duration>,
}

impl PageFetcher {
    pub fn new(settings: &Settings, delay: Arc<dyn Delay>) -> Result<Self, reqwest::Error> {
        let http = &settings.http;
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (ACCEPT, http.accept.as_str()),
            (ACCEPT_LANGUAGE, http.accept_language.as_str()),
            (REFERER, http.referer.as_str()),
            (CONNECTION, "keep-alive"),
        ] {
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    headers.insert(name, v);
                }
                Err(_) => warn!("Skipping invalid {} header value: {:?}", name, value),
            }
        }

        let client = Client::builder()
            .user_agent(http.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()?;

        Ok(PageFetcher {
            client,
            base_url: settings.base_url.clone(),
            max_retries: http.max_retries,
            backoff_base: Duration::from_millis(http.backoff_base_ms),
            max_retry_after: Duration::from_secs(http.max_retry_after_secs),
            after_fetch: settings.pacing.after_fetch(),
            delay,
        })
    }

    /// Fetch and parse the title page. The politeness delay is applied
    /// whatever the outcome.
    pub async fn fetch(&self, id: &str) -> Result<TitlePage, FetchError> {
        let url = title_url(&self.base_url, id);
        debug!("Fetching page HTML: {}", url);

        let result = self.fetch_with_retry(&url).await;
        self.delay.wait(self.after_fetch).await;
        result.map(|body| TitlePage::parse(id, &body))
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(url, attempt + 1).await {
                Ok(body) => return Ok(body),
                Err(failure) if failure.retryable && attempt < self.max_retries => {
                    let backoff = self.backoff(attempt, failure.retry_after);
                    warn!(
                        "{} (attempt {}/{}), backing off {:.1}s",
                        failure.error,
                        attempt + 1,
                        self.max_retries + 1,
                        backoff.as_secs_f64()
                    );
                    self.delay.wait(backoff).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn fetch_once(&self, url: &str, attempts: u32) -> Result<String, Failure> {
        let transport = |source: reqwest::Error| Failure {
            error: FetchError::Transport {
                url: url.to_string(),
                attempts,
                source,
            },
            retryable: true,
            retry_after: None,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            return response.text().await.map_err(transport);
        }

        Err(Failure {
            retry_after: retry_after(&response),
            retryable: is_retryable(status),
            error: FetchError::Status {
                url: url.to_string(),
                status,
                attempts,
            },
        })
    }

    /// `backoff_base * 2^attempt`, raised to a server-advertised Retry-After
    /// when that is longer. Both are capped at `max_retry_after`.
    fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = 2u32
            .checked_pow(attempt)
            .and_then(|factor| self.backoff_base.checked_mul(factor))
            .unwrap_or(Duration::MAX);
        backoff.max(retry_after.unwrap_or_default()).min(self.max_retry_after)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    RETRY_STATUSES.contains(&status.as_u16())
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::RecordingDelay;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const PAGE: &str = r#"<html><body><div data-testid="interests"><span class="ipc-chip__text">Drama</span></div></body></html>"#;

    fn fetcher(base: &str) -> (PageFetcher, Arc<RecordingDelay>) {
        let delay = Arc::new(RecordingDelay::default());
        let settings = Settings::for_tests(base);
        (PageFetcher::new(&settings, delay.clone()).unwrap(), delay)
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt_after_two_503s() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tt0111161/"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tt0111161/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let (f, delay) = fetcher(&server.uri());
        let page = f.fetch("tt0111161").await.unwrap();
        assert_eq!(page.id(), "tt0111161");

        let waits = delay.waits();
        assert_eq!(waits[..2], [secs(2), secs(4)]);
        assert!(delay.total() >= secs(6));
    }

    #[tokio::test]
    async fn not_found_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let (f, delay) = fetcher(&server.uri());
        match f.fetch("tt404").await {
            Err(FetchError::Status { status, attempts, .. }) => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(attempts, 1);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("404 must not succeed"),
        }
        // Only the politeness wait, which is zero in tests.
        assert_eq!(delay.waits(), vec![Duration::ZERO]);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&server)
            .await;

        let (f, delay) = fetcher(&server.uri());
        let err = f.fetch("tt503").await.err().unwrap();
        assert_eq!(err.attempts(), 4);
        assert_eq!(delay.waits(), vec![secs(2), secs(4), secs(8), Duration::ZERO]);
    }

    #[tokio::test]
    async fn honours_longer_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let (f, delay) = fetcher(&server.uri());
        assert!(f.fetch("tt429").await.is_ok());
        assert_eq!(delay.waits()[0], secs(7));
    }

    #[tokio::test]
    async fn long_retry_runs_saturate_at_ceiling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(41)
            .mount(&server)
            .await;

        let delay = Arc::new(RecordingDelay::default());
        let mut settings = Settings::for_tests(&server.uri());
        settings.http.max_retries = 40;
        let f = PageFetcher::new(&settings, delay.clone()).unwrap();

        match f.fetch("tt1").await {
            Err(FetchError::Status { status, attempts, .. }) => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(attempts, 41);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("503 must not succeed"),
        }
        let waits = delay.waits();
        assert_eq!(waits[..5], [secs(2), secs(4), secs(8), secs(16), secs(32)]);
        assert!(waits[5..40].iter().all(|w| *w == secs(60)));
    }

    #[test]
    fn huge_backoff_base_does_not_overflow() {
        let mut settings = Settings::for_tests("http://127.0.0.1:9");
        settings.http.backoff_base_ms = u64::MAX;
        let f = PageFetcher::new(&settings, Arc::new(RecordingDelay::default())).unwrap();
        assert_eq!(f.backoff(3, None), secs(60));
        assert_eq!(f.backoff(u32::MAX, Some(secs(5))), secs(60));
    }

    #[test]
    fn retry_after_is_capped() {
        let (f, _) = fetcher("http://127.0.0.1:9");
        assert_eq!(f.backoff(0, Some(secs(600))), secs(60));
        assert_eq!(f.backoff(1, Some(secs(1))), secs(4));
    }

    #[tokio::test]
    async fn sends_browser_headers() {
        let server = MockServer::start().await;
        let defaults = Settings::default().http;
        // `header()` splits on commas, which both of these values contain.
        let exact = |name: &'static str, expected: String| {
            move |req: &Request| {
                req.headers.get(name).and_then(|v| v.to_str().ok()) == Some(expected.as_str())
            }
        };
        Mock::given(method("GET"))
            .and(exact("user-agent", defaults.user_agent.clone()))
            .and(exact("accept-language", defaults.accept_language.clone()))
            .and(header("referer", "https://www.imdb.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let (f, _) = fetcher(&server.uri());
        assert!(f.fetch("tt1").await.is_ok());
    }

    #[tokio::test]
    async fn transport_errors_are_retried() {
        // Nothing listens on the discard port.
        let (f, delay) = fetcher("http://127.0.0.1:9");
        match f.fetch("tt1").await {
            Err(FetchError::Transport { attempts, .. }) => assert_eq!(attempts, 4),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("nothing should answer"),
        }
        assert_eq!(delay.waits().len(), 4);
    }
}
