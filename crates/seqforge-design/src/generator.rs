//! Single-candidate production from a leased model session.

use std::sync::Arc;

use rand::Rng;
use seqforge_models::{SampleOptions, SequenceModel};

use crate::constraints::GenerationConstraints;
use crate::properties::sanitize;

/// Longest template prefix handed to the model as a seed.
const SEED_WINDOW: usize = 20;

/// Fallback seed when no usable template is supplied. Most natural
/// sequences begin with methionine.
const DEFAULT_SEED: &str = "M";

/// Produces one raw candidate per call from a resident model session.
///
/// The seed is fixed at construction from the request template; the
/// target length is drawn uniformly from the constraint window on every
/// call so repeated attempts explore the window.
pub struct CandidateGenerator {
    session: Arc<dyn SequenceModel>,
    seed: String,
    min_length: usize,
    max_length: usize,
    temperature: f64,
}

impl CandidateGenerator {
    pub fn new(
        session: Arc<dyn SequenceModel>,
        constraints: &GenerationConstraints,
        temperature: f64,
    ) -> Self {
        Self {
            session,
            seed: build_seed(constraints.template.as_deref(), constraints.max_length),
            min_length: constraints.min_length,
            max_length: constraints.max_length,
            temperature,
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Produce one sanitized candidate.
    ///
    /// Models commonly echo the seed at the start of their output; the
    /// echoed copy is stripped and the seed re-attached so the candidate
    /// always begins with it exactly once.
    pub async fn produce(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let target_length = rand::thread_rng().gen_range(self.min_length..=self.max_length);
        let options = SampleOptions {
            seed: self.seed.clone(),
            target_length,
            temperature: self.temperature,
        };

        let raw = self.session.sample(&options).await?;
        let continuation = raw.strip_prefix(self.seed.as_str()).unwrap_or(&raw);
        Ok(format!("{}{}", self.seed, sanitize(continuation)))
    }
}

/// The seed window is additionally capped at `max_length`, so an
/// oversized template cannot push every candidate past the length bound.
fn build_seed(template: Option<&str>, max_length: usize) -> String {
    let window = SEED_WINDOW.min(max_length);
    let seed: String = template
        .map(sanitize)
        .unwrap_or_default()
        .chars()
        .take(window)
        .collect();
    if seed.is_empty() {
        DEFAULT_SEED.to_string()
    } else {
        seed
    }
}
