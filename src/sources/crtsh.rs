// src/sources/crtsh.rs
use crate::domain::DomainSink;
use crate::error::Result;
use crate::session::Session;
use crate::sources::Source;
use crate::types::{SourceGroup, SourceInfo};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CrtShEntry {
    name_value: String,
}

/// crt.sh certificate transparency logs source
#[derive(Debug, Clone)]
pub struct CrtShSource {
    name: String,
    base_url: String,
}

impl Default for CrtShSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CrtShSource {
    pub fn new() -> Self {
        Self {
            name: "crtsh".to_string(),
            base_url: "https://crt.sh".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Source for CrtShSource {
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
        let query = format!("%.{}", target);
        let url = format!(
            "{}/?q={}&output=json",
            self.base_url,
            urlencoding::encode(&query)
        );

        let entries: Vec<CrtShEntry> = session.get_json(&url, &self.name).await?;
        debug!("[{}] {} certificate entries for {}", self.name, entries.len(), target);

        // name_value can hold several names separated by newlines
        for entry in entries {
            for line in entry.name_value.lines() {
                sink.add(line.trim().trim_start_matches("*."));
            }
        }

        Ok(())
    }
}
