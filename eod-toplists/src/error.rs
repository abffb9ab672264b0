//! Run-level errors.
//!
//! Per-row and per-batch failures never reach this type; they are absorbed
//! where they happen. Only conditions that end the run are represented here.

use thiserror::Error;

/// Errors that abort a run, each mapped to a distinct exit status.
#[derive(Error, Debug)]
pub enum RunError {
    /// No rows across all batches, or no resolvable session date
    #[error("No data: {0}")]
    NoData(String),

    /// Narrative collaborator credentials are required but absent
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] eod_common::Error),

    /// Anything else (IO, serialization)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunError {
    /// Process exit status for this error.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::NoData(_) => 2,
            Self::MissingCredentials(_) => 3,
            Self::Config(_) | Self::Other(_) => 1,
        }
    }
}
