/// Error taxonomy for the fetch-and-persist pipeline.
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::Macro;

/// Failures talking to the remote macro API.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Conduit error [{code}]: {info}")]
    Api { code: String, info: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Failures writing to the local destination.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid macro name {0:?}")]
    InvalidName(String),
}

/// What went wrong for a single job.
#[derive(Debug, Error)]
pub enum FetchCause {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A per-job failure, tagged with the macro it belongs to when known.
#[derive(Debug)]
pub struct FetchError {
    pub entry: Option<Macro>,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(entry: Option<Macro>, cause: impl Into<FetchCause>) -> Self {
        Self {
            entry,
            cause: cause.into(),
        }
    }

    /// Name of the offending macro, if the failure is tied to one.
    pub fn macro_name(&self) -> Option<&str> {
        self.entry.as_ref().map(|m| m.name.as_str())
    }

    pub fn is_storage(&self) -> bool {
        matches!(self.cause, FetchCause::Storage(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.cause, FetchCause::Transport(_))
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.macro_name() {
            Some(name) => write!(f, "{}: {}", name, self.cause),
            None => write!(f, "{}", self.cause),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Failures that abort a run instead of producing a Report.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Can't write to specified directory: {0}")]
    Probe(#[source] StorageError),

    #[error("Failed to fetch macros: {0}")]
    Listing(#[source] TransportError),

    #[error("Result collector stopped with {outstanding} jobs unfinished: {reason}")]
    CollectorStopped { outstanding: usize, reason: String },
}
