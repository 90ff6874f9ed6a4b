//! CLI support for banded-report
//!
//! Provides programmatic access to the `banded` commands so they can be
//! embedded in other tools and tested without spawning a process.

mod check;
mod convert;
mod docs;
mod run;

pub use check::{CheckResult, execute_check};
pub use convert::{parse_param, rows_from_json_text, value_to_json};
pub use docs::{DocTopic, get_doc_topic, get_docs_overview};
pub use run::{RunOptions, execute_run, render_pages};

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    config::ConfigError,
    error::{GenerateError, ValidationError},
    parser::ParseError,
    resolve::DataError,
};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid template: {0}")]
    Validation(#[from] ValidationError),

    #[error("Generation failed: {0}")]
    Generate(#[from] GenerateError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid data: {0}")]
    Data(#[from] DataError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No input provided. Use --data or pipe JSON rows to stdin.")]
    NoInput,

    #[error("Invalid parameter '{0}', expected NAME=VALUE")]
    InvalidParam(String),

    #[error("Unknown topic: '{0}'\nRun 'banded docs' to see available topics.")]
    UnknownTopic(String),
}
