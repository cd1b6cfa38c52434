//! SeqForge constrained sequence design.
//!
//! Built on top of `seqforge-models`: a request supplies a model id,
//! declarative [`constraints::GenerationConstraints`], and pipeline
//! tunables; the [`pipeline::GenerationPipeline`] leases the model,
//! produces candidates, scores each against the constraints, and
//! returns the best valid one.

// constraints module - declarative generation constraints
pub mod constraints;

// properties module - amino-acid tables and derived sequence properties
pub mod properties;

// evaluator module - pure constraint scoring
pub mod evaluator;

// generator module - single-candidate production
pub mod generator;

// pipeline module - multi-candidate orchestration
pub mod pipeline;

pub mod error;

pub use constraints::GenerationConstraints;
pub use error::{GenerateError, GenerateResult};
pub use evaluator::{ConstraintEvaluator, Evaluation};
pub use generator::CandidateGenerator;
pub use pipeline::{GenerationPipeline, GenerationResult, PipelineOptions};
pub use properties::{CompositionKey, ResidueClass, SequenceProperties, CANONICAL_RESIDUES};
