//! Typed errors for extraction.
//!
//! Most failures are transient and get downgraded close to where they
//! happen (a placeholder line item, a failed month). [`ExtractError::is_fatal`]
//! marks the ones that must stop the run.

use ordertrace_config::ConfigError;
use ordertrace_io::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Credentials rejected, or the session was revoked mid-run.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The bridge could not be reached at all.
    #[error("bridge unreachable at {endpoint}: {detail}")]
    Unreachable { endpoint: String, detail: String },

    #[error("navigation to {url} failed: {detail}")]
    Navigation { url: String, detail: String },

    #[error("timed out waiting for {url}")]
    Timeout { url: String },

    /// The bridge answered with something that is not a page snapshot.
    #[error("bridge protocol error: {0}")]
    Protocol(String),

    /// Pagination stopped early; the month's listing is not complete.
    #[error("order listing for {month} incomplete: {reason}")]
    IncompleteListing { month: String, reason: String },

    #[error("store write failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ExtractError {
    /// Errors that abort the whole run rather than one order or month.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExtractError::Auth(_) | ExtractError::Store(_) | ExtractError::Config(_)
        )
    }
}
