// src/sources/censys.rs
use crate::domain::DomainSink;
use crate::error::{Result, SubhiveError};
use crate::session::Session;
use crate::sources::Source;
use crate::types::{SourceGroup, SourceInfo};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

const MAX_PAGES: usize = 3;
const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct CensysResponse {
    result: CensysResult,
}

#[derive(Debug, Deserialize)]
struct CensysResult {
    #[serde(default)]
    hits: Vec<CensysHit>,
    #[serde(default)]
    links: Option<CensysLinks>,
}

#[derive(Debug, Deserialize)]
struct CensysHit {
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CensysLinks {
    #[serde(default)]
    next: String,
}

/// Censys certificate search.
///
/// Not scoped to the target: the free-text query also matches certificates
/// of related infrastructure on other domains, and those names are kept.
#[derive(Debug, Clone)]
pub struct CensysSource {
    name: String,
    base_url: String,
    api_id: Option<String>,
    api_secret: Option<String>,
}

impl Default for CensysSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CensysSource {
    pub fn new() -> Self {
        Self {
            name: "censys".to_string(),
            base_url: "https://search.censys.io/api".to_string(),
            api_id: None,
            api_secret: None,
        }
    }

    pub fn with_credentials(mut self, api_id: Option<String>, api_secret: Option<String>) -> Self {
        self.api_id = api_id.filter(|s| !s.is_empty());
        self.api_secret = api_secret.filter(|s| !s.is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Source for CensysSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            group: SourceGroup::Premium,
            needs_key: true,
            scoped: false,
        }
    }

    async fn enumerate(&self, target: &str, sink: &DomainSink, session: &Session) -> Result<()> {
        let (api_id, api_secret) = match (&self.api_id, &self.api_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(SubhiveError::MissingCredentials {
                    source_name: self.name.to_string(),
                    vars: "CENSYS_ID and CENSYS_SECRET".to_string(),
                })
            }
        };

        let mut cursor = String::new();
        for page in 1..=MAX_PAGES {
            let mut url = format!(
                "{}/v2/certificates/search?q={}&per_page={}",
                self.base_url,
                urlencoding::encode(target),
                PER_PAGE
            );
            if !cursor.is_empty() {
                url.push_str(&format!("&cursor={}", urlencoding::encode(&cursor)));
            }

            let request = session
                .client
                .get(&url)
                .basic_auth(api_id, Some(api_secret))
                .header("Accept", "application/json");
            let text = session
                .send(request, &self.name)
                .await?
                .text()
                .await?;

            let response: CensysResponse = serde_json::from_str(&text)
                .map_err(|e| SubhiveError::Parse(format!("{}: invalid JSON: {}", self.name, e)))?;

            debug!("[{}] page {}: {} hits", self.name, page, response.result.hits.len());
            for hit in &response.result.hits {
                for name in &hit.names {
                    sink.add(name.trim_start_matches("*."));
                }
            }

            cursor = response.result.links.map(|l| l.next).unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainSet;
    use crate::types::Config;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_censys_missing_credentials_skips_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let source = CensysSource::new()
            .with_base_url(&server.url())
            .with_credentials(Some("id".to_string()), None);
        let session = Session::new(&Config::default()).unwrap();
        let sink = DomainSink::new(DomainSet::new(), "example.com", false);

        let err = source.enumerate("example.com", &sink, &session).await.unwrap_err();
        assert!(matches!(err, SubhiveError::MissingCredentials { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_censys_follows_cursor() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/v2/certificates/search")
            .match_query(Matcher::Regex("^q=example\\.com&per_page=100$".into()))
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .with_status(200)
            .with_body(
                r#"{"result": {"hits": [{"names": ["*.example.com", "shop.example.com"]}],
                    "links": {"next": "page2"}}}"#,
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v2/certificates/search")
            .match_query(Matcher::UrlEncoded("cursor".into(), "page2".into()))
            .with_status(200)
            .with_body(
                r#"{"result": {"hits": [{"names": ["cdn.partner.net"]}], "links": {"next": ""}}}"#,
            )
            .create_async()
            .await;

        let source = CensysSource::new()
            .with_base_url(&server.url())
            .with_credentials(Some("id".to_string()), Some("secret".to_string()));
        let session = Session::new(&Config {
            rate_limits: Default::default(),
            ..Config::default()
        })
        .unwrap();
        let set = DomainSet::new();
        let sink = DomainSink::new(set.clone(), "example.com", source.info().scoped);

        source.enumerate("example.com", &sink, &session).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(
            set.snapshot(),
            vec!["cdn.partner.net", "example.com", "shop.example.com"]
        );
    }
}
