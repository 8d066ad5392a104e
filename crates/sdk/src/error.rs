use std::time::Duration;

use thiserror::Error;

/// Every failure that can abort an attestation run.
///
/// None of these are recovered locally: each external call is attempted exactly once and the
/// first error terminates the run.
#[derive(Error, Debug)]
pub enum AttestError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("failed to reach the attestation network: {0}")]
    Connection(String),

    #[error("proof submission rejected: {0}")]
    Submission(String),

    #[error("received {event} before the proof was included in a block")]
    OutOfOrderEvent { event: &'static str },

    #[error("confirmation lookup failed: {0}")]
    Lookup(String),

    #[error("failed to persist attestation to {path}: {reason}")]
    Persistence { path: String, reason: String },

    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout { operation: &'static str, after: Duration },

    #[error("invalid proof input: {0}")]
    ProofInput(String),
}

impl AttestError {
    pub(crate) fn persistence(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        AttestError::Persistence {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = AttestError> = std::result::Result<T, E>;
