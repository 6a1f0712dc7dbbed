// src/sources/hackertarget.rs
use crate::domain::DomainSink;
use crate::error::{Result, SubhiveError};
use crate::session::Session;
use crate::sources::Source;
use crate::types::{SourceGroup, SourceInfo};
use async_trait::async_trait;

/// HackerTarget host search source
#[derive(Debug, Clone)]
pub struct HackerTargetSource {
    name: String,
    base_url: String,
}

impl Default for HackerTargetSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HackerTargetSource {
    pub fn new() -> Self {
        Self {
            name: "hackertarget".to_string(),
            base_url: "https://api.hackertarget.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Source for HackerTargetSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            group: SourceGroup::Core,
            needs_key: false,
            scoped: true,
        }
    }

    async fn enumerate(&self, target: &str, sink: &DomainSink, session: &Session) -> Result<()> {
        let url = format!("{}/hostsearch/?q={}", self.base_url, target);
        let text = session.get_text(&url, &self.name).await?;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // host,ip
            match line.split_once(',') {
                Some((host, _)) => {
                    sink.add(host);
                }
                // Quota and lookup errors come back as plain text with a 200
                None if line.starts_with("error") || line.contains("API count exceeded") => {
                    return Err(SubhiveError::Parse(format!("{}: {}", self.name, line)));
                }
                None => {
                    sink.add(line);
                }
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

    async fn run_against(body: &str) -> (DomainSet, Result<()>) {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/hostsearch/")
            .match_query(Matcher::UrlEncoded("q".into(), "example.com".into()))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let source = HackerTargetSource::new().with_base_url(&server.url());
        let session = Session::new(&Config::default()).unwrap();
        let set = DomainSet::new();
        let sink = DomainSink::new(set.clone(), "example.com", true);
        let result = source.enumerate("example.com", &sink, &session).await;
        (set, result)
    }

    #[tokio::test]
    async fn test_hackertarget_csv_lines() {
        let (set, result) = run_against(
            "mail.example.com,10.0.0.1\nvpn.example.com,10.0.0.2\nevilexample.com,10.0.0.3\n",
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(set.snapshot(), vec!["mail.example.com", "vpn.example.com"]);
    }

    #[tokio::test]
    async fn test_hackertarget_error_prefixed_hosts_are_findings() {
        let (set, result) = run_against(
            "errors.example.com,10.0.0.1\nerror-pages.example.com,10.0.0.2\nwww.example.com,10.0.0.3\n",
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(
            set.snapshot(),
            vec!["error-pages.example.com", "errors.example.com", "www.example.com"]
        );
    }

    #[tokio::test]
    async fn test_hackertarget_error_body_is_failure() {
        let (set, result) = run_against("error check your search parameter").await;

        assert!(matches!(result, Err(SubhiveError::Parse(_))));
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_hackertarget_quota_is_failure() {
        let (set, result) = run_against("API count exceeded - Increase Quota with Membership").await;

        assert!(matches!(result, Err(SubhiveError::Parse(_))));
        assert!(set.is_empty());
    }
}
