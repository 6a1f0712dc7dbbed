// src/targets.rs
use crate::error::{Result, SubhiveError};
use log::warn;
use std::fs;
use std::path::Path;
use url::Url;

/// Splits a comma-separated target list, dropping empty entries.
pub fn parse_target_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads one target per line, dropping empty lines.
pub fn load_target_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Reduces a hostname or URL to a bare, lower-case host.
pub fn canonicalize(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let lower = raw.to_lowercase();
    let with_scheme = if lower.starts_with("http:") || lower.starts_with("https:") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| SubhiveError::InvalidTarget(format!("{}: {}", raw, e)))?;

    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_lowercase())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| SubhiveError::InvalidTarget(format!("{}: no host", raw)))?;

    Ok(host)
}

/// Canonicalizes every entry, warning about and dropping the ones that
/// do not parse, and dropping duplicates while keeping input order.
pub fn canonicalize_all(raw: &[String]) -> Vec<String> {
    let mut targets: Vec<String> = Vec::with_capacity(raw.len());
    for entry in raw {
        match canonicalize(entry) {
            Ok(host) if !targets.contains(&host) => targets.push(host),
            Ok(_) => {}
            Err(e) => warn!("Skipping target: {}", e),
        }
    }
    targets
}
