// src/sources/anubisdb.rs
use crate::domain::DomainSink;
use crate::error::{Result, SubhiveError};
use crate::session::Session;
use crate::sources::Source;
use crate::types::{PublishOutcome, SourceGroup, SourceInfo};
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PublishBody<'a> {
    subdomains: &'a [String],
}

/// Community subdomain database: queried like any other source and
/// optionally fed back with what a scan discovered.
#[derive(Debug, Clone)]
pub struct AnubisDbSource {
    name: String,
    base_url: String,
}

impl AnubisDbSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            name: "anubisdb".to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, target: &str) -> String {
        format!("{}/subdomains/{}", self.base_url, target)
    }

    /// Sends `domains` back to the database. Only one target may be
    /// published per call; anything else is skipped with a diagnostic.
    pub async fn publish(
        &self,
        session: &Session,
        targets: &[String],
        domains: &[String],
    ) -> PublishOutcome {
        let target = match targets {
            [target] => target,
            _ => {
                warn!("Cannot send multiple domains to {}", self.name);
                return PublishOutcome::Skipped(format!(
                    "expected exactly one target, got {}",
                    targets.len()
                ));
            }
        };

        if domains.is_empty() {
            return PublishOutcome::Skipped("no subdomains to send".to_string());
        }

        info!("Sending {} subdomains for {} to {}", domains.len(), target, self.name);
        let body = PublishBody { subdomains: domains };

        match session.post_json(&self.endpoint(target), &body, &self.name).await {
            Ok(response) if response.status().as_u16() == 200 => {
                info!("Successfully sent results to {}", self.name);
                PublishOutcome::Published(domains.len())
            }
            Ok(response) => {
                let status = response.status().as_u16();
                warn!("Error sending results to {} - status code: {}", self.name, status);
                PublishOutcome::Rejected(status)
            }
            Err(e) => {
                warn!("Error connecting to {}: {}", self.name, e);
                PublishOutcome::Failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl Source for AnubisDbSource {
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
        let value: serde_json::Value = session.get_json(&self.endpoint(target), &self.name).await?;

        let entries = value.as_array().ok_or_else(|| {
            SubhiveError::Parse(format!("{}: unexpected response format", self.name))
        })?;

        for entry in entries.iter().filter_map(|e| e.as_str()) {
            sink.add(entry);
        }

        Ok(())
    }
}
