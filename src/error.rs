// src/error.rs
//! Error types for scans, analyzer providers and catalog search.

use thiserror::Error;

/// Why a scan failed. Empty results are not errors; see `pipeline::MatchOutcome`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScanError {
    /// The expensive analyzer did not answer within its timeout.
    #[error("analysis timed out")]
    AnalysisTimeout,
    /// The expensive analyzer failed; there is no further fallback.
    #[error("analysis rejected: {0}")]
    AnalysisRejected(String),
    /// The search index was unreachable, timed out, or answered garbage.
    #[error("retrieval failure: {0}")]
    RetrievalFailure(String),
    /// The caller abandoned the scan.
    #[error("scan cancelled")]
    Cancelled,
    /// The request itself was unusable (bad base64, no frames, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ScanError {
    /// Stable cause tag for telemetry and API payloads.
    pub fn cause_tag(&self) -> &'static str {
        match self {
            ScanError::AnalysisTimeout => "analysis_timeout",
            ScanError::AnalysisRejected(_) => "analysis_rejected",
            ScanError::RetrievalFailure(_) => "retrieval_failure",
            ScanError::Cancelled => "cancelled",
            ScanError::InvalidInput(_) => "invalid_input",
        }
    }

    /// What the app should tell the user.
    pub fn user_hint(&self) -> &'static str {
        match self {
            ScanError::AnalysisTimeout | ScanError::AnalysisRejected(_) => {
                "We couldn't read that product. Try again with better lighting."
            }
            ScanError::RetrievalFailure(_) => "Search is unavailable right now. Try again.",
            ScanError::Cancelled => "Scan cancelled.",
            ScanError::InvalidInput(_) => "Try again with better lighting.",
        }
    }
}

/// Failures reported by analyzer collaborators (OCR, text and vision classifiers).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("missing api key")]
    MissingApiKey,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by the search index.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}
