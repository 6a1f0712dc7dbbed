// src/lib.rs
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod resolver;
pub mod session;
pub mod sources;
pub mod targets;
pub mod types;

pub use cli::Args;
pub use domain::{normalize, DomainSet, DomainSink};
pub use engine::Scanner;
pub use error::{Result, SubhiveError};
pub use types::{Config, ScanReport, SourceOutcome};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
