use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::config::{title_url, Settings};
use crate::parser::text_of;
use crate::record::NOT_RATED;

/// Reads the content rating linked from a title's hero block. Deliberately
/// single-shot: no retry, no backoff.
pub struct CertificationFetcher {
    client: Client,
    base_url: String,
}

impl CertificationFetcher {
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(settings.certification.user_agent.as_str())
            .timeout(Duration::from_secs(settings.certification.timeout_secs))
            .build()?;
        Ok(CertificationFetcher {
            client,
            base_url: settings.base_url.clone(),
        })
    }

    /// The rating text, or `"Not Rated"` on any failure.
    pub async fn get(&self, id: &str) -> String {
        match self.lookup(id).await {
            Ok(Some(cert)) => cert,
            Ok(None) => {
                debug!("No certification anchor for {}", id);
                NOT_RATED.to_string()
            }
            Err(e) => {
                warn!("Error fetching certification for {}: {:#}", id, e);
                NOT_RATED.to_string()
            }
        }
    }

    async fn lookup(&self, id: &str) -> Result<Option<String>> {
        let url = title_url(&self.base_url, id);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("{} returned {}", url, status);
        }
        let body = response.text().await?;
        certification_in(&body, id)
    }
}

/// Text of the certificates anchor for `id`, if present and non-empty.
pub fn certification_in(html: &str, id: &str) -> Result<Option<String>> {
    let query = format!(
        r#"a[href="/title/{}/parentalguide/?ref_=tt_ov_pg#certificates"]"#,
        id
    );
    let selector = Selector::parse(&query)
        .map_err(|e| anyhow::anyhow!("{:?}", e))
        .with_context(|| format!("bad certificate query for {}", id))?;

    let doc = Html::parse_document(html);
    let cert = doc
        .select(&selector)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty());
    Ok(cert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hero(id: &str, rating: &str) -> String {
        format!(
            r#"<html><body><ul><li>1994</li><li><a href="/title/{}/parentalguide/?ref_=tt_ov_pg#certificates">
                {}
            </a></li></ul></body></html>"#,
            id, rating
        )
    }

    #[test]
    fn anchor_text_is_trimmed() {
        let html = hero("tt0107290", "PG-13");
        assert_eq!(certification_in(&html, "tt0107290").unwrap().as_deref(), Some("PG-13"));
    }

    #[test]
    fn anchor_for_another_title_is_ignored() {
        let html = hero("tt0000001", "R");
        assert_eq!(certification_in(&html, "tt0107290").unwrap(), None);
    }

    #[test]
    fn blank_anchor_counts_as_missing() {
        let html = hero("tt0107290", "   ");
        assert_eq!(certification_in(&html, "tt0107290").unwrap(), None);
    }

    #[tokio::test]
    async fn fetches_rating() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tt0107290/"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(hero("tt0107290", "PG-13")))
            .expect(1)
            .mount(&server)
            .await;

        let f = CertificationFetcher::new(&Settings::for_tests(&server.uri())).unwrap();
        assert_eq!(f.get("tt0107290").await, "PG-13");
    }

    #[tokio::test]
    async fn missing_anchor_is_not_rated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .mount(&server)
            .await;

        let f = CertificationFetcher::new(&Settings::for_tests(&server.uri())).unwrap();
        assert_eq!(f.get("tt0107290").await, NOT_RATED);
    }

    #[tokio::test]
    async fn server_error_is_not_rated_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let f = CertificationFetcher::new(&Settings::for_tests(&server.uri())).unwrap();
        assert_eq!(f.get("tt0107290").await, NOT_RATED);
    }

    #[tokio::test]
    async fn unreachable_host_is_not_rated() {
        let f = CertificationFetcher::new(&Settings::for_tests("http://127.0.0.1:9")).unwrap();
        assert_eq!(f.get("tt0107290").await, NOT_RATED);
    }
}
