// src/output.rs
use crate::error::{Result, SubhiveError};
use crate::types::{OutputConfig, OutputFormat, ScanReport};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn write_report(&self, report: &ScanReport) -> Result<()> {
        if let Some(file_path) = &self.config.file {
            self.write_to_file(file_path, report)
        } else {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            self.write_output(&mut handle, report)
        }
    }

    fn write_to_file(&self, file_path: &str, report: &ScanReport) -> Result<()> {
        if let Some(parent) = Path::new(file_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SubhiveError::Output(format!("Failed to create directory: {}", e))
                })?;
            }
        }

        // Reports for several targets land in the same file
        let mut file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .map_err(|e| SubhiveError::Output(format!("Failed to open file: {}", e)))?;

        self.write_output(&mut file, report)
    }

    pub fn write_output<W: Write>(&self, writer: &mut W, report: &ScanReport) -> Result<()> {
        match self.config.format {
            OutputFormat::Text => self.write_text_output(writer, report),
            OutputFormat::Json => self.write_json_output(writer, report),
            OutputFormat::Csv => self.write_csv_output(writer, report),
        }
        .map_err(|e| SubhiveError::Output(e.to_string()))
    }

    fn write_text_output<W: Write>(&self, writer: &mut W, report: &ScanReport) -> std::io::Result<()> {
        if self.config.silent {
            for domain in &report.domains {
                writeln!(writer, "{}", domain)?;
            }
            return Ok(());
        }

        writeln!(writer, "Found {} subdomains", report.domains.len())?;
        writeln!(writer, "----------------")?;

        for domain in &report.domains {
            match &report.resolved_ips {
                Some(resolved) => {
                    let ip = resolved
                        .get(domain)
                        .copied()
                        .flatten()
                        .map(|ip| ip.to_string())
                        .unwrap_or_default();
                    writeln!(writer, "{}: {}", domain, ip)?;
                }
                None => writeln!(writer, "{}", domain)?,
            }
        }

        let unique_ips = report.unique_ips();
        if report.resolved_ips.is_some() {
            writeln!(writer, "Found {} unique IPs", unique_ips.len())?;
            for ip in &unique_ips {
                writeln!(writer, "{}", ip)?;
            }
        }

        if self.config.verbose {
            for outcome in &report.source_outcomes {
                match &outcome.result {
                    Ok(count) => writeln!(
                        writer,
                        "[{}] {}: {} new",
                        outcome.source, outcome.target, count
                    )?,
                    Err(failure) => writeln!(
                        writer,
                        "[{}] {}: {:?} - {}",
                        outcome.source, outcome.target, failure.kind, failure.message
                    )?,
                }
            }
        }

        writeln!(
            writer,
            "Found {} subdomains and {} unique IPs for {} ({} of {} sources succeeded)",
            report.domains.len(),
            unique_ips.len(),
            report.target,
            report.successes(),
            report.source_outcomes.len()
        )
    }

    fn write_json_output<W: Write>(&self, writer: &mut W, report: &ScanReport) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        writeln!(writer, "{}", json)
    }

    fn write_csv_output<W: Write>(&self, writer: &mut W, report: &ScanReport) -> std::io::Result<()> {
        writeln!(writer, "domain,ip")?;
        for domain in &report.domains {
            let ip = report.ip_of(domain).map(|ip| ip.to_string()).unwrap_or_default();
            writeln!(writer, "{},{}", domain, ip)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureKind, SourceFailure, SourceOutcome};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn report(with_ips: bool) -> ScanReport {
        let domains = vec!["a.example.com".to_string(), "b.example.com".to_string()];
        let resolved_ips = with_ips.then(|| {
            let mut map = BTreeMap::new();
            map.insert("a.example.com".to_string(), Some("10.0.0.1".parse().unwrap()));
            map.insert("b.example.com".to_string(), None);
            map
        });

        ScanReport {
            target: "example.com".to_string(),
            domains,
            resolved_ips,
            source_outcomes: vec![
                SourceOutcome {
                    source: "crtsh".to_string(),
                    target: "example.com".to_string(),
                    result: Ok(2),
                    duration: Duration::from_millis(5),
                },
                SourceOutcome {
                    source: "censys".to_string(),
                    target: "example.com".to_string(),
                    result: Err(SourceFailure::new(FailureKind::Config, "missing credentials")),
                    duration: Duration::from_millis(0),
                },
            ],
            duration: Duration::from_millis(10),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn render(config: OutputConfig, report: &ScanReport) -> String {
        let mut buf = Vec::new();
        OutputManager::new(config).write_output(&mut buf, report).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_silent_prints_bare_domains() {
        let config = OutputConfig {
            silent: true,
            ..OutputConfig::default()
        };
        assert_eq!(render(config, &report(true)), "a.example.com\nb.example.com\n");
    }

    #[test]
    fn test_text_with_ips_and_summary() {
        let out = render(OutputConfig::default(), &report(true));
        assert!(out.contains("a.example.com: 10.0.0.1\n"));
        assert!(out.contains("b.example.com: \n"));
        assert!(out.contains("Found 1 unique IPs"));
        assert!(out.contains(
            "Found 2 subdomains and 1 unique IPs for example.com (1 of 2 sources succeeded)"
        ));
    }

    #[test]
    fn test_csv_and_json() {
        let csv = OutputConfig {
            format: OutputFormat::Csv,
            ..OutputConfig::default()
        };
        assert_eq!(
            render(csv, &report(true)),
            "domain,ip\na.example.com,10.0.0.1\nb.example.com,\n"
        );

        let json = OutputConfig {
            format: OutputFormat::Json,
            ..OutputConfig::default()
        };
        let value: serde_json::Value = serde_json::from_str(&render(json, &report(false))).unwrap();
        assert_eq!(value["target"], "example.com");
        assert!(value["resolved_ips"].is_null());
    }

    #[test]
    fn test_file_output_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("results.txt");
        let config = OutputConfig {
            file: Some(path.to_string_lossy().to_string()),
            silent: true,
            ..OutputConfig::default()
        };
        let manager = OutputManager::new(config);

        manager.write_report(&report(false)).unwrap();
        manager.write_report(&report(false)).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 4);
    }
}
