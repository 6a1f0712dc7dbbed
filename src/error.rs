// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SubhiveError>;

#[derive(Debug, Error)]
pub enum SubhiveError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{source_name}: missing credentials (set {vars})")]
    MissingCredentials {
        source_name: String,
        vars: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{source_name} returned status {status}")]
    Status {
        source_name: String,
        status: u16,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Process error: {0}")]
    Process(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait ErrorContext<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| SubhiveError::Config(format!("{}: {}", f(), e)))
    }
}
