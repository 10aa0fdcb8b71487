use std::path::PathBuf;

use ordertrace_io::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error in {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Config validation error (missing root, inverted range, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// A side's month could not be read.
    #[error("{side} data unreadable: {source}")]
    Load {
        side: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write failed for {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
