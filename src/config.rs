// src/config.rs
use crate::error::{ErrorContext, Result, SubhiveError};
use crate::types::{Config, MAX_RECURSION_DEPTH};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use toml::value::Table;

/// Loads `config_path` on top of the defaults (a missing file just means
/// defaults), then applies environment overrides and validates.
pub fn load_config(config_path: &str) -> Result<Config> {
    let mut config = Config::default();

    if Path::new(config_path).exists() {
        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path))?;
        apply_toml(&mut config, &contents)?;
    }

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn apply_toml(config: &mut Config, contents: &str) -> Result<()> {
    let root: Table = toml::from_str(contents).with_context(|| "Failed to parse config file".to_string())?;

    if let Some(scan) = root.get("scan").and_then(|v| v.as_table()) {
        if let Some(secs) = integer(scan, "http_timeout") {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = integer(scan, "source_timeout") {
            config.source_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = integer(scan, "scan_timeout") {
            // 0 disables the ceiling
            config.scan_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(n) = integer(scan, "max_concurrency") {
            config.max_concurrency = n as usize;
        }
        if let Some(ua) = string(scan, "user_agent") {
            config.user_agent = ua;
        }
        if let Some(proxy) = string(scan, "proxy") {
            config.proxy = Some(proxy);
        }
        if let Some(url) = string(scan, "anubis_db_url") {
            config.anubis_db_url = url;
        }
        if let Some(publish) = scan.get("publish").and_then(|v| v.as_bool()) {
            config.publish = publish;
        }
        if let Some(path) = string(scan, "nmap_path") {
            config.nmap_path = path;
        }
    }

    if let Some(limits) = root.get("rate_limits").and_then(|v| v.as_table()) {
        for (source, value) in limits {
            let limit = value.as_integer().and_then(|n| u32::try_from(n).ok());
            config.rate_limits.insert(source.clone(), limit.filter(|n| *n > 0));
        }
    }

    if let Some(creds) = root.get("credentials").and_then(|v| v.as_table()) {
        if let Some(id) = string(creds, "censys_id") {
            config.credentials.censys_id = Some(id);
        }
        if let Some(secret) = string(creds, "censys_secret") {
            config.credentials.censys_secret = Some(secret);
        }
        if let Some(keys) = creds.get("shodan_keys").and_then(|v| v.as_array()) {
            config.credentials.shodan_keys = keys
                .iter()
                .filter_map(|k| k.as_str().map(|s| s.to_string()))
                .collect();
        }
    }

    if let Some(recursion) = root.get("recursion").and_then(|v| v.as_table()) {
        if let Some(enabled) = recursion.get("enabled").and_then(|v| v.as_bool()) {
            config.recursion.enabled = enabled;
        }
        if let Some(depth) = integer(recursion, "max_depth") {
            config.recursion.max_depth = depth as usize;
        }
        if let Some(max) = integer(recursion, "max_targets") {
            config.recursion.max_targets = max as usize;
        }
    }

    if let Some(resolver) = root.get("resolver").and_then(|v| v.as_table()) {
        if let Some(threads) = integer(resolver, "threads") {
            config.resolver.threads = threads as usize;
        }
        if let Some(secs) = integer(resolver, "timeout") {
            config.resolver.timeout = Duration::from_secs(secs);
        }
        if let Some(system) = resolver.get("use_system_resolver").and_then(|v| v.as_bool()) {
            config.resolver.use_system_resolver = system;
        }
        if let Some(servers) = resolver.get("nameservers").and_then(|v| v.as_array()) {
            config.resolver.nameservers = servers
                .iter()
                .filter_map(|s| s.as_str().map(|s| s.to_string()))
                .collect();
        }
    }

    Ok(())
}

fn integer(table: &Table, key: &str) -> Option<u64> {
    table
        .get(key)
        .and_then(|v| v.as_integer())
        .and_then(|n| u64::try_from(n).ok())
}

fn string(table: &Table, key: &str) -> Option<String> {
    table.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(id) = env::var("CENSYS_ID") {
        config.credentials.censys_id = Some(id);
    }
    if let Ok(secret) = env::var("CENSYS_SECRET") {
        config.credentials.censys_secret = Some(secret);
    }
    if let Ok(keys) = env::var("SHODAN_API_KEY") {
        config.credentials.shodan_keys = keys
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Ok(url) = env::var("SUBHIVE_ANUBIS_DB_URL") {
        config.anubis_db_url = url;
    }
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.http_timeout.is_zero() || config.source_timeout.is_zero() {
        return Err(SubhiveError::Config("Timeouts must be greater than 0".to_string()));
    }
    if config.max_concurrency == 0 {
        return Err(SubhiveError::Config("max_concurrency must be greater than 0".to_string()));
    }
    if config.resolver.threads == 0 {
        return Err(SubhiveError::Config("Resolver threads must be greater than 0".to_string()));
    }
    if config.recursion.max_depth > MAX_RECURSION_DEPTH {
        return Err(SubhiveError::Config(format!(
            "Recursion depth {} exceeds the maximum of {}",
            config.recursion.max_depth, MAX_RECURSION_DEPTH
        )));
    }
    Ok(())
}
