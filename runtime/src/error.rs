//! Error types for fetching pages and writing reports.

use std::path::PathBuf;

/// Errors that end a harvest run.
///
/// Navigation and interaction failures in browser modes never surface here;
/// they degrade to an empty result instead.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to write report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Whether this error came from the HTTP layer of a static harvest.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, HarvestError::Fetch { .. } | HarvestError::Status { .. })
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;
