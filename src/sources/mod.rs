// src/sources/mod.rs
use crate::domain::DomainSink;
use crate::error::Result;
use crate::session::Session;
use crate::types::{Config, SourceGroup, SourceInfo};
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

mod anubisdb;
mod censys;
mod crtsh;
mod dnsdumpster;
mod hackertarget;
mod nmap;
mod shodan;

pub use anubisdb::AnubisDbSource;
pub use censys::CensysSource;
pub use crtsh::CrtShSource;
pub use dnsdumpster::DnsDumpsterSource;
pub use hackertarget::HackerTargetSource;
pub use nmap::NmapSource;
pub use shodan::ShodanSource;

pub const SOURCE_NAMES: [&str; 7] = [
    "crtsh",
    "hackertarget",
    "dnsdumpster",
    "anubisdb",
    "censys",
    "shodan",
    "nmap",
];

/// A pluggable connector querying one external data source.
///
/// Implementations write each finding to `sink` as soon as it is parsed,
/// so partial progress survives a later failure. Errors are returned, not
/// raised: the engine turns them into a failed outcome for this source only.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    fn info(&self) -> SourceInfo;
    async fn enumerate(&self, target: &str, sink: &DomainSink, session: &Session) -> Result<()>;
}

pub fn create_source(name: &str, config: &Config) -> Option<Arc<dyn Source>> {
    match name.to_lowercase().as_str() {
        "crtsh" => Some(Arc::new(CrtShSource::new())),
        "hackertarget" => Some(Arc::new(HackerTargetSource::new())),
        "dnsdumpster" => Some(Arc::new(DnsDumpsterSource::new())),
        "anubisdb" => Some(Arc::new(AnubisDbSource::new(&config.anubis_db_url))),
        "censys" => Some(Arc::new(CensysSource::new().with_credentials(
            config.credentials.censys_id.clone(),
            config.credentials.censys_secret.clone(),
        ))),
        "shodan" => Some(Arc::new(
            ShodanSource::new().with_api_keys(config.credentials.shodan_keys.clone()),
        )),
        "nmap" => Some(Arc::new(NmapSource::new(&config.nmap_path))),
        _ => None,
    }
}

pub fn get_all_sources(config: &Config) -> Vec<Arc<dyn Source>> {
    SOURCE_NAMES
        .iter()
        .filter_map(|name| create_source(name, config))
        .collect()
}

/// Connectors to run for each target: the core group plus whatever the
/// selection flags enable, or exactly the named ones when `--sources` is set.
pub fn build_worklist(config: &Config) -> Vec<Arc<dyn Source>> {
    let selection = &config.selection;

    if let Some(names) = &selection.only {
        let mut sources: Vec<Arc<dyn Source>> = Vec::new();
        for name in names {
            match create_source(name.trim(), config) {
                Some(source) if !sources.iter().any(|s| s.name() == source.name()) => {
                    sources.push(source)
                }
                Some(_) => {}
                None => warn!("Unknown source: {}", name),
            }
        }
        return sources;
    }

    get_all_sources(config)
        .into_iter()
        .filter(|source| match source.info().group {
            SourceGroup::Core => true,
            SourceGroup::Premium => selection.additional_info,
            SourceGroup::Scan => selection.with_nmap,
        })
        .collect()
}
