// src/types.rs
use crate::error::SubhiveError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::IpAddr;
use std::time::Duration;

/// Hard ceiling for `--max-depth`; deeper recursion against third-party
/// services is refused at validation time.
pub const MAX_RECURSION_DEPTH: usize = 3;

pub const DEFAULT_ANUBIS_DB_URL: &str = "https://jonlu.ca/anubis";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Per network call.
    pub http_timeout: Duration,
    /// Per connector run, covering all of its requests.
    pub source_timeout: Duration,
    /// Wall-clock ceiling for the connector phase of one target.
    pub scan_timeout: Option<Duration>,
    pub max_concurrency: usize,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub rate_limits: HashMap<String, Option<u32>>,
    pub credentials: Credentials,
    pub anubis_db_url: String,
    pub publish: bool,
    pub nmap_path: String,
    pub selection: SourceSelection,
    pub recursion: RecursionConfig,
    pub output: OutputConfig,
    pub resolver: ResolverConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut rate_limits = HashMap::new();
        rate_limits.insert("censys".to_string(), Some(1));
        rate_limits.insert("shodan".to_string(), Some(1));
        rate_limits.insert("hackertarget".to_string(), Some(2));

        Self {
            http_timeout: Duration::from_secs(15),
            source_timeout: Duration::from_secs(45),
            scan_timeout: Some(Duration::from_secs(180)),
            max_concurrency: 10,
            user_agent: format!("subhive/{}", env!("CARGO_PKG_VERSION")),
            proxy: None,
            rate_limits,
            credentials: Credentials::default(),
            anubis_db_url: DEFAULT_ANUBIS_DB_URL.to_string(),
            publish: true,
            nmap_path: "nmap".to_string(),
            selection: SourceSelection::default(),
            recursion: RecursionConfig::default(),
            output: OutputConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub censys_id: Option<String>,
    pub censys_secret: Option<String>,
    pub shodan_keys: Vec<String>,
}

/// Which connectors join the worklist on top of the core set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSelection {
    pub additional_info: bool,
    pub with_nmap: bool,
    pub only: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecursionConfig {
    pub enabled: bool,
    pub max_depth: usize,
    pub max_targets: usize,
}

impl Default for RecursionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_depth: 1,
            max_targets: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub verbose: bool,
    pub silent: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            verbose: false,
            silent: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub enabled: bool,
    pub threads: usize,
    pub timeout: Duration,
    pub nameservers: Vec<String>,
    pub use_system_resolver: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threads: 50,
            timeout: Duration::from_secs(5),
            nameservers: vec![
                "8.8.8.8:53".to_string(),
                "8.8.4.4:53".to_string(),
                "1.1.1.1:53".to_string(),
                "1.0.0.1:53".to_string(),
            ],
            use_system_resolver: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceGroup {
    /// Always part of the worklist.
    Core,
    /// Needs API credentials, enabled by `--additional-info`.
    Premium,
    /// Active scanning, enabled by `--with-nmap`.
    Scan,
}

pub struct SourceInfo {
    pub name: String,
    pub group: SourceGroup,
    pub needs_key: bool,
    /// When false the connector may surface hostnames outside the target.
    pub scoped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Config,
    Network,
    Status,
    Parse,
    Timeout,
    Process,
    Panicked,
    Cancelled,
}

impl From<&SubhiveError> for FailureKind {
    fn from(err: &SubhiveError) -> Self {
        match err {
            SubhiveError::Config(_) | SubhiveError::MissingCredentials { .. } => FailureKind::Config,
            SubhiveError::Network(_) | SubhiveError::Http(_) | SubhiveError::Io(_) => {
                FailureKind::Network
            }
            SubhiveError::Status { .. } => FailureKind::Status,
            SubhiveError::Parse(_) => FailureKind::Parse,
            SubhiveError::Timeout(_) => FailureKind::Timeout,
            SubhiveError::Process(_) => FailureKind::Process,
            SubhiveError::Resolution(_)
            | SubhiveError::InvalidTarget(_)
            | SubhiveError::Output(_) => FailureKind::Network,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SourceFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<SubhiveError> for SourceFailure {
    fn from(err: SubhiveError) -> Self {
        Self::new(FailureKind::from(&err), err.to_string())
    }
}

/// Number of new names a connector contributed, or why it failed.
pub type SourceResult = std::result::Result<usize, SourceFailure>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    pub target: String,
    pub result: SourceResult,
    pub duration: Duration,
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: String,
    pub domains: Vec<String>,
    /// Present only when IP resolution ran; `None` values did not resolve.
    pub resolved_ips: Option<BTreeMap<String, Option<IpAddr>>>,
    pub source_outcomes: Vec<SourceOutcome>,
    pub duration: Duration,
    pub timestamp: String,
}

impl ScanReport {
    pub fn successes(&self) -> usize {
        self.source_outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.source_outcomes.len() - self.successes()
    }

    pub fn unique_ips(&self) -> BTreeSet<IpAddr> {
        self.resolved_ips
            .iter()
            .flat_map(|map| map.values().flatten().copied())
            .collect()
    }

    pub fn unresolved(&self) -> Vec<&str> {
        match &self.resolved_ips {
            Some(map) => map
                .iter()
                .filter(|(_, ip)| ip.is_none())
                .map(|(domain, _)| domain.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn ip_of(&self, domain: &str) -> Option<IpAddr> {
        self.resolved_ips.as_ref()?.get(domain).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PublishOutcome {
    Published(usize),
    Skipped(String),
    Rejected(u16),
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumerationStats {
    pub targets: usize,
    pub unique_subdomains: usize,
    pub unique_ips: usize,
    pub failed_sources: usize,
    /// Reports that could not be written.
    pub output_failures: usize,
    pub duration: Duration,
}
