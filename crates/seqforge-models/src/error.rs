//! Error types for model lifecycle operations.

use crate::registry::Capability;

/// Errors produced by the model lifecycle layer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The requested model identifier is not in the catalogue
    #[error("model not found: {0}")]
    NotFound(String),

    /// The budget cannot admit this model even after evicting every
    /// evictable slot
    #[error(
        "capacity exceeded for model {model_id}: need {needed_bytes} bytes, \
         budget {budget_bytes} bytes, evictable {evictable_bytes} bytes"
    )]
    CapacityExceeded {
        model_id: String,
        needed_bytes: u64,
        budget_bytes: u64,
        evictable_bytes: u64,
    },

    /// The external loader failed or timed out; the slot is in Error state
    /// and eligible for a retry on the next acquire
    #[error("model load failed for {model_id}: {reason}")]
    LoadFailed { model_id: String, reason: String },

    /// The model is catalogued but does not advertise the capability the
    /// caller needs
    #[error("model {model_id} does not support {capability:?}")]
    CapabilityMissing {
        model_id: String,
        capability: Capability,
    },

    /// A lease was released more times than it was acquired
    #[error("release without matching acquire for model {0}")]
    LoanUnderflow(String),

    /// Invalid catalogue or pool configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for model lifecycle operations.
pub type ModelResult<T> = Result<T, ModelError>;
