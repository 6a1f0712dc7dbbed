// src/sources/dnsdumpster.rs
use crate::domain::DomainSink;
use crate::error::{Result, SubhiveError};
use crate::session::Session;
use crate::sources::Source;
use crate::types::{SourceGroup, SourceInfo};
use async_trait::async_trait;
use log::debug;
use regex::Regex;
use reqwest::header::{COOKIE, REFERER, SET_COOKIE};

/// DNSDumpster search form scraper
#[derive(Debug, Clone)]
pub struct DnsDumpsterSource {
    name: String,
    base_url: String,
}

impl Default for DnsDumpsterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsDumpsterSource {
    pub fn new() -> Self {
        Self {
            name: "dnsdumpster".to_string(),
            base_url: "https://dnsdumpster.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn extract_csrf_token(&self, html: &str) -> Result<String> {
        let re = Regex::new(
            r#"name=["']csrfmiddlewaretoken["'][^>]*?value=["']([^"']+)["']|value=["']([^"']+)["'][^>]*?name=["']csrfmiddlewaretoken["']"#,
        )
        .map_err(|e| SubhiveError::Parse(format!("Regex error: {}", e)))?;

        re.captures(html)
            .and_then(|cap| cap.get(1).or_else(|| cap.get(2)))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| SubhiveError::Parse(format!("{}: CSRF token not found", self.name)))
    }
}

fn csrf_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .find(|pair| pair.trim_start().starts_with("csrftoken="))
        .map(|pair| pair.trim().to_string())
}

#[async_trait]
impl Source for DnsDumpsterSource {
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
        let landing = format!("{}/", self.base_url);

        let response = session
            .send(session.client.get(&landing).header(REFERER, &landing), &self.name)
            .await?;
        let cookie = csrf_cookie(&response);
        let html = response
            .text()
            .await?;
        let token = self.extract_csrf_token(&html)?;

        let mut request = session
            .client
            .post(&landing)
            .header(REFERER, &landing)
            .form(&[
                ("csrfmiddlewaretoken", token.as_str()),
                ("targetip", target),
                ("user", "free"),
            ]);
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        } else {
            debug!("[{}] no csrftoken cookie on landing page", self.name);
        }

        let results = session
            .send(request, &self.name)
            .await?
            .text()
            .await?;

        let pattern = format!(r"(?i)\b(?:[a-z0-9-]+\.)*{}\b", regex::escape(target));
        let re = Regex::new(&pattern)
            .map_err(|e| SubhiveError::Parse(format!("Regex error: {}", e)))?;

        for found in re.find_iter(&results) {
            sink.add(found.as_str());
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
    async fn test_dnsdumpster_form_flow() {
        let mut server = mockito::Server::new_async().await;
        let landing = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("set-cookie", "csrftoken=abc123; Path=/; SameSite=Lax")
            .with_body(r#"<form><input type="hidden" name="csrfmiddlewaretoken" value="tok-42"></form>"#)
            .create_async()
            .await;
        let search = server
            .mock("POST", "/")
            .match_header("cookie", "csrftoken=abc123")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("csrfmiddlewaretoken".into(), "tok-42".into()),
                Matcher::UrlEncoded("targetip".into(), "example.com".into()),
            ]))
            .with_status(200)
            .with_body(
                "<td class=\"col-md-4\">Mail.example.com<br></td>\
                 <td>ns1.example.com</td><td>evilexample.com</td>",
            )
            .create_async()
            .await;

        let source = DnsDumpsterSource::new().with_base_url(&server.url());
        let session = Session::new(&Config::default()).unwrap();
        let set = DomainSet::new();
        let sink = DomainSink::new(set.clone(), "example.com", true);

        source.enumerate("example.com", &sink, &session).await.unwrap();

        landing.assert_async().await;
        search.assert_async().await;
        assert_eq!(set.snapshot(), vec!["mail.example.com", "ns1.example.com"]);
    }

    #[tokio::test]
    async fn test_dnsdumpster_missing_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let source = DnsDumpsterSource::new().with_base_url(&server.url());
        let session = Session::new(&Config::default()).unwrap();
        let sink = DomainSink::new(DomainSet::new(), "example.com", true);

        let err = source.enumerate("example.com", &sink, &session).await.unwrap_err();
        assert!(matches!(err, SubhiveError::Parse(_)));
    }
}
