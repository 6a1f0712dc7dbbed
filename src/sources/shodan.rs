// src/sources/shodan.rs
use crate::domain::DomainSink;
use crate::error::{Result, SubhiveError};
use crate::session::Session;
use crate::sources::Source;
use crate::types::{SourceGroup, SourceInfo};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

const MAX_PAGES: u32 = 5;

#[derive(Debug, Deserialize)]
struct ShodanResponse {
    #[serde(default)]
    subdomains: Vec<String>,
    #[serde(default)]
    more: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ShodanSource {
    name: String,
    base_url: String,
    api_keys: Vec<String>,
}

impl Default for ShodanSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ShodanSource {
    pub fn new() -> Self {
        Self {
            name: "shodan".to_string(),
            base_url: "https://api.shodan.io".to_string(),
            api_keys: Vec::new(),
        }
    }

    pub fn with_api_keys(mut self, keys: Vec<String>) -> Self {
        self.api_keys = keys.into_iter().filter(|k| !k.is_empty()).collect();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn get_random_api_key(&self) -> Option<&String> {
        use rand::seq::SliceRandom;
        self.api_keys.choose(&mut rand::thread_rng())
    }
}

#[async_trait]
impl Source for ShodanSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            group: SourceGroup::Premium,
            needs_key: true,
            scoped: true,
        }
    }

    async fn enumerate(&self, target: &str, sink: &DomainSink, session: &Session) -> Result<()> {
        let api_key = self
            .get_random_api_key()
            .ok_or_else(|| SubhiveError::MissingCredentials {
                source_name: self.name.to_string(),
                vars: "SHODAN_API_KEY".to_string(),
            })?;

        let url = format!("{}/dns/domain/{}", self.base_url, target);

        for page in 1..=MAX_PAGES {
            let request = session
                .client
                .get(&url)
                .query(&[("key", api_key.as_str()), ("page", &page.to_string())])
                .header("Accept", "application/json");

            let text = session
                .send(request, &self.name)
                .await?
                .text()
                .await?;

            let response: ShodanResponse = serde_json::from_str(&text)
                .map_err(|e| SubhiveError::Parse(format!("{}: invalid JSON: {}", self.name, e)))?;

            if let Some(error) = response.error {
                return Err(SubhiveError::Network(format!("{}: API error: {}", self.name, error)));
            }

            debug!("[{}] page {}: {} labels", self.name, page, response.subdomains.len());
            for label in &response.subdomains {
                if label.is_empty() {
                    sink.add(target);
                } else {
                    sink.add(&format!("{}.{}", label, target));
                }
            }

            if response.more != Some(true) {
                break;
            }
        }

        Ok(())
    }
}
