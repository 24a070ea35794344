//! Error taxonomy for the migration pipeline.
//!
//! Stage failures are *data* ([`crate::stages::ValidationResult`]) and never
//! surface here; `MigrateError` covers only conditions that are fatal to a
//! session (unreadable input, missing required columns) or caller mistakes
//! (unknown session, invalid remediation choice).

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MigrateError {
    /// The uploaded file lacks required columns. Every missing column is
    /// listed, not just the first.
    #[error("{dataset} file is missing required columns: {}", .missing.join(", "))]
    Schema {
        dataset: &'static str,
        missing: Vec<String>,
    },

    /// The input could not be parsed as CSV at all.
    #[error("failed to read {dataset} file")]
    Malformed {
        dataset: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("unknown payment processor '{0}' (expected 'stripe' or 'bluesnap')")]
    UnknownProcessor(String),

    #[error("unknown session {0}")]
    UnknownSession(Uuid),

    /// The session already reached `Complete` or `Cancelled`.
    #[error("session {0} has already reached a terminal state")]
    Terminal(Uuid),

    #[error("session {0} is not awaiting input")]
    NotSuspended(Uuid),

    /// A remediation choice that the suspended stage does not offer.
    #[error("'{choice}' is not a valid choice for stage '{stage}'")]
    InvalidChoice {
        stage: &'static str,
        choice: &'static str,
    },

    #[error("no artifact named '{0}' in this session")]
    UnknownArtifact(String),

    #[error("artifact generation failed")]
    Artifact(#[source] anyhow::Error),
}
