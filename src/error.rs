//! Error types for sheetfolio
//!
//! Domain errors are plain `thiserror` enums. Only [`RefreshError`] ever
//! reaches the presentation layer, where it is shown as a warning while the
//! fallback dataset is rendered instead.

use serde::Serialize;
use thiserror::Error;

/// Why a single source candidate was rejected.
///
/// These never abort a refresh on their own; the resolver records them and
/// moves on to the next candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum AttemptFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("response too short ({len} chars, need more than {min})")]
    TooShort { len: usize, min: usize },
}

/// A rejected candidate together with the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAttempt {
    pub source: String,
    pub reason: AttemptFailure,
}

/// Failure of a whole refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum RefreshError {
    #[error("all {} data sources failed", attempts.len())]
    ResolutionExhausted { attempts: Vec<FailedAttempt> },

    #[error("the sheet contained no active holdings")]
    EmptyResult,
}

impl RefreshError {
    /// One line per failed candidate, for log output and the TUI warning.
    pub fn details(&self) -> Vec<String> {
        match self {
            RefreshError::ResolutionExhausted { attempts } => attempts
                .iter()
                .map(|a| format!("{}: {}", a.source, a.reason))
                .collect(),
            RefreshError::EmptyResult => Vec::new(),
        }
    }
}

/// Invalid values in the config file or on the command line.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No sheet URL configured; pass --url or set sheet_url in the config file")]
    MissingUrl,

    #[error("Unknown sheet format: {0} (expected 'simple' or 'extended')")]
    UnknownFormat(String),

    #[error("Unknown weight scale: {0} (expected 'auto', 'fraction' or 'percent')")]
    UnknownWeightScale(String),

    #[error("Mirror template must contain {{url}} or {{raw}}, got {0}")]
    InvalidMirror(String),
}
