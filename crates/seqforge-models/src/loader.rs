//! Collaborator traits for model materialization and inference.
//!
//! The lifecycle layer treats both loading and inference as black boxes
//! with unspecified latency and possible failure. Implementations are
//! supplied per model at catalogue registration time.

use std::sync::Arc;

use async_trait::async_trait;

use crate::registry::ModelDescriptor;

/// Options for a single sampling call.
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Seed/prompt prefix handed to the model
    pub seed: String,
    /// Target output length in residues
    pub target_length: usize,
    /// Sampling temperature
    pub temperature: f64,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            seed: "M".to_string(),
            target_length: 100,
            temperature: 0.8,
        }
    }
}

/// A resident model session capable of producing raw sequence text.
///
/// One `sample` call produces one raw candidate. Output may contain
/// non-canonical characters; callers sanitize before scoring.
#[async_trait]
pub trait SequenceModel: Send + Sync {
    /// Identifier of the model this session belongs to
    fn model_id(&self) -> &str;

    /// Produce one raw output from the model
    async fn sample(
        &self,
        options: &SampleOptions,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// The result of a successful load: an opaque session plus the observed
/// resident size, which may differ from the descriptor's declared estimate.
pub struct LoadedModel {
    pub session: Arc<dyn SequenceModel>,
    pub resident_bytes: u64,
}

/// Loads and unloads one model family.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Materialize the model into memory
    async fn load(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<LoadedModel, Box<dyn std::error::Error + Send + Sync>>;

    /// Release the model's resources
    async fn unload(
        &self,
        session: Arc<dyn SequenceModel>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
