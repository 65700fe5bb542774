//! Error types for the harvest pipeline.
//!
//! Fetch failures are split by stage so the CLI can say *where* a run died:
//! the HTTP exchange itself (`transport`), an OAI `<error>` envelope
//! (`protocol`), or a body that is not XML at all (`malformed`).

use arxiv_harvest_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("OAI-PMH error {code}: {message}")]
    Protocol { code: String, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn stage(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport",
            FetchError::Protocol { .. } => "protocol",
            FetchError::Malformed(_) => "malformed",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Transport(format!("request timed out: {}", e))
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The driver's FAILED state: which page broke and what was already
    /// submitted in this window.
    #[error("page {page} failed at {} stage after {indexed} documents: {source}", .source.stage())]
    Page {
        page: u32,
        indexed: u64,
        #[source]
        source: FetchError,
    },
    #[error("bulk request failed: {0:#}")]
    Index(anyhow::Error),
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
    /// A backfill month failed under the abort policy.
    #[error("month {label} failed ({completed} documents indexed in earlier months): {source}")]
    Month {
        label: String,
        completed: u64,
        #[source]
        source: Box<HarvestError>,
    },
}

impl HarvestError {
    pub fn stage(&self) -> &'static str {
        match self {
            HarvestError::Validation(_) => "validation",
            HarvestError::Page { source, .. } => source.stage(),
            HarvestError::Index(_) => "index",
            HarvestError::Checkpoint(_) => "checkpoint",
            HarvestError::Month { source, .. } => source.stage(),
        }
    }
}
