//! Error types for the generation pipeline.

use std::time::Duration;

use seqforge_models::ModelError;

/// Errors produced by constrained generation.
///
/// Every runtime variant carries the model identifier, elapsed wall time,
/// and the number of candidates evaluated, so callers have enough context
/// to decide on a retry policy.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GenerateError {
    /// The model lifecycle layer refused or failed the acquire
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The request's constraints are internally inconsistent
    #[error("invalid constraints: {0}")]
    InvalidConstraints(String),

    /// The inference collaborator failed mid-run
    #[error("inference failed on {model_id} after {candidates_evaluated} candidates: {reason}")]
    Inference {
        model_id: String,
        reason: String,
        elapsed: Duration,
        candidates_evaluated: usize,
    },

    /// The wall-time budget elapsed before any candidate was evaluated
    #[error("generation on {model_id} timed out after {elapsed:?} with no candidates")]
    Timeout {
        model_id: String,
        elapsed: Duration,
        candidates_evaluated: usize,
    },

    /// The caller cancelled the request
    #[error("generation on {model_id} cancelled after {candidates_evaluated} candidates")]
    Cancelled {
        model_id: String,
        elapsed: Duration,
        candidates_evaluated: usize,
    },

    /// Every evaluated candidate failed a hard constraint
    #[error("no valid candidate from {model_id} in {candidates_evaluated} attempts")]
    NoValidCandidate {
        model_id: String,
        elapsed: Duration,
        candidates_evaluated: usize,
    },
}

/// Result type for generation operations.
pub type GenerateResult<T> = Result<T, GenerateError>;
