use crate::types::{Config, OutputFormat};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "subhive",
    version,
    about = "Concurrent subdomain enumeration across many public sources",
    long_about = "subhive queries certificate transparency logs, DNS aggregators, a community\nsubdomain database and optional premium APIs or scanners at the same time,\nand merges everything they find into one deduplicated list."
)]
pub struct Args {
    /// Target domain(s) or URL(s), comma-separated
    #[arg(short = 't', long = "target", value_name = "TARGET", value_delimiter = ',')]
    pub target: Vec<String>,

    /// File containing one target per line
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Resolve discovered subdomains to IP addresses
    #[arg(short = 'i', long = "ip")]
    pub ip: bool,

    /// Only print subdomains, one per line
    #[arg(short = 's', long = "silent")]
    pub silent: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Rescan newly discovered subdomains as targets
    #[arg(short = 'r', long = "recursive")]
    pub recursive: bool,

    /// Maximum recursion depth for --recursive
    #[arg(long = "max-depth", value_name = "N")]
    pub max_depth: Option<usize>,

    /// Maximum number of subdomains rescanned per run
    #[arg(long = "max-recursive", value_name = "N")]
    pub max_recursive: Option<usize>,

    /// Include premium API sources (needs credentials)
    #[arg(short = 'a', long = "additional-info")]
    pub additional_info: bool,

    /// Include the nmap DNSSEC scan
    #[arg(short = 'n', long = "with-nmap")]
    pub with_nmap: bool,

    /// Do not send results to the community database
    #[arg(long = "no-publish")]
    pub no_publish: bool,

    /// Output file (appended to)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_file: Option<String>,

    /// Output in JSON format
    #[arg(long = "json", conflicts_with = "csv")]
    pub json: bool,

    /// Output in CSV format
    #[arg(long = "csv")]
    pub csv: bool,

    /// Specific sources to use (comma-separated)
    #[arg(long = "sources", value_delimiter = ',')]
    pub sources: Option<Vec<String>>,

    /// List all available sources
    #[arg(long = "list-sources")]
    pub list_sources: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    /// Per-source timeout in seconds
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of sources running at once
    #[arg(long = "concurrency", value_name = "N")]
    pub concurrency: Option<usize>,
}

impl Args {
    /// Read targets from stdin when nothing else was given and input is piped
    pub fn use_stdin(&self) -> bool {
        self.target.is_empty() && self.file.is_none() && !atty::is(atty::Stream::Stdin)
    }

    /// Layers command line flags over `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(file) = &self.output_file {
            config.output.file = Some(file.clone());
        }
        config.output.verbose |= self.verbose;
        config.output.silent |= self.silent;
        if self.json {
            config.output.format = OutputFormat::Json;
        }
        if self.csv {
            config.output.format = OutputFormat::Csv;
        }

        config.resolver.enabled |= self.ip;
        config.recursion.enabled |= self.recursive;
        if let Some(depth) = self.max_depth {
            config.recursion.max_depth = depth;
        }
        if let Some(max) = self.max_recursive {
            config.recursion.max_targets = max;
        }

        config.selection.additional_info |= self.additional_info;
        config.selection.with_nmap |= self.with_nmap;
        if let Some(sources) = &self.sources {
            config.selection.only = Some(sources.clone());
        }
        if self.no_publish {
            config.publish = false;
        }
        if let Some(secs) = self.timeout {
            config.source_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.concurrency {
            config.max_concurrency = n;
        }
    }
}
