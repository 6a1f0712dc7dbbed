// src/sources/nmap.rs
use crate::domain::DomainSink;
use crate::error::{Result, SubhiveError};
use crate::session::Session;
use crate::sources::Source;
use crate::types::{SourceGroup, SourceInfo};
use async_trait::async_trait;
use log::debug;
use regex::Regex;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// DNSSEC NSEC walking through nmap's `dns-nsec-enum` script.
///
/// The child process is killed if the connector is cancelled.
#[derive(Debug, Clone)]
pub struct NmapSource {
    name: String,
    binary: String,
}

impl NmapSource {
    pub fn new(binary: &str) -> Self {
        Self {
            name: "nmap".to_string(),
            binary: binary.to_string(),
        }
    }

    fn args(target: &str) -> Vec<String> {
        vec![
            "-sSU".to_string(),
            "-p".to_string(),
            "53".to_string(),
            "--script".to_string(),
            "dns-nsec-enum".to_string(),
            "--script-args".to_string(),
            format!("dns-nsec-enum.domains={}", target),
            target.to_string(),
        ]
    }
}

#[async_trait]
impl Source for NmapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            group: SourceGroup::Scan,
            needs_key: false,
            scoped: true,
        }
    }

    async fn enumerate(&self, target: &str, sink: &DomainSink, _session: &Session) -> Result<()> {
        let hostname = Regex::new(r"(?i)\b(?:[a-z0-9-]+\.)+[a-z0-9-]+\b")
            .map_err(|e| SubhiveError::Parse(format!("Regex error: {}", e)))?;

        let mut child = Command::new(&self.binary)
            .args(Self::args(target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SubhiveError::Process(format!("failed to launch {}: {}", self.binary, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SubhiveError::Process("stdout not captured".to_string()))?;
        let stderr_pipe = child.stderr.take();

        // Both pipes are drained together so a chatty stderr cannot stall stdout
        let read_stdout = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                for found in hostname.find_iter(&line) {
                    sink.add(found.as_str());
                }
            }
            Ok::<(), std::io::Error>(())
        };
        let read_stderr = async {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr_pipe {
                pipe.read_to_string(&mut buf).await?;
            }
            Ok::<String, std::io::Error>(buf)
        };

        let (stdout_done, stderr) = tokio::join!(read_stdout, read_stderr);
        stdout_done?;
        let stderr = stderr?;

        let status = child.wait().await?;
        if !status.success() {
            debug!("[{}] stderr: {}", self.name, stderr.trim());
            return Err(SubhiveError::Process(format!(
                "{} exited with {}: {}",
                self.binary,
                status,
                stderr.lines().next().unwrap_or("").trim()
            )));
        }

        Ok(())
    }
}
