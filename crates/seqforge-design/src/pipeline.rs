//! Multi-candidate generation, scoring, and ranking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use seqforge_models::{Capability, ModelLease, ModelManager};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::constraints::GenerationConstraints;
use crate::error::{GenerateError, GenerateResult};
use crate::evaluator::ConstraintEvaluator;
use crate::generator::CandidateGenerator;
use crate::properties::SequenceProperties;

/// Tunables for one generation request.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Keep producing until at least this many candidates are evaluated,
    /// unless time or cancellation forces an early stop
    pub min_candidates: usize,
    /// Upper bound on attempts. The search also ends as soon as a
    /// perfect-scoring (1.0) candidate exists once the minimum is met,
    /// since later candidates cannot displace it
    pub max_candidates: usize,
    /// Bounds candidate production only, not model loading
    pub max_wall_time: Duration,
    pub temperature: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            min_candidates: 1,
            max_candidates: 8,
            max_wall_time: Duration::from_secs(30),
            temperature: 0.8,
        }
    }
}

impl PipelineOptions {
    fn validate(&self) -> GenerateResult<()> {
        if self.min_candidates < 1 {
            return Err(GenerateError::InvalidConstraints(
                "min_candidates must be at least 1".into(),
            ));
        }
        if self.min_candidates > self.max_candidates {
            return Err(GenerateError::InvalidConstraints(format!(
                "candidate window is empty: min {} > max {}",
                self.min_candidates, self.max_candidates
            )));
        }
        Ok(())
    }
}

/// The outcome of a successful generation request.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub generation_id: Uuid,
    pub model_id: String,
    pub sequence: String,
    pub score: f64,
    pub properties: SequenceProperties,
    pub candidates_evaluated: usize,
    pub elapsed: Duration,
}

/// Orchestrates acquire, the candidate loop, ranking, and release.
#[derive(Clone)]
pub struct GenerationPipeline {
    manager: ModelManager,
    evaluator: ConstraintEvaluator,
}

impl GenerationPipeline {
    pub fn new(manager: ModelManager) -> Self {
        Self {
            manager,
            evaluator: ConstraintEvaluator::new(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: ConstraintEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Produce, score, and rank candidates from one model.
    ///
    /// The model lease is released on every exit path, including error
    /// and cancellation. Cancellation is checked at the top of every
    /// iteration and raced against the in-flight inference call.
    pub async fn generate(
        &self,
        model_id: &str,
        constraints: &GenerationConstraints,
        options: &PipelineOptions,
        cancel: &CancellationToken,
    ) -> GenerateResult<GenerationResult> {
        options.validate()?;
        constraints.validate()?;
        self.manager
            .require_capability(model_id, Capability::Generation)?;

        let started = Instant::now();
        let lease = self.manager.acquire(model_id).await?;

        let outcome = self
            .run_loop(&lease, constraints, options, cancel, started)
            .await;

        // Scoped acquisition: the loan goes back no matter how the loop
        // exited.
        if let Err(e) = self.manager.release(lease).await {
            warn!(model_id = %model_id, error = %e, "failed to release model lease");
        }
        outcome
    }

    async fn run_loop(
        &self,
        lease: &ModelLease,
        constraints: &GenerationConstraints,
        options: &PipelineOptions,
        cancel: &CancellationToken,
        started: Instant,
    ) -> GenerateResult<GenerationResult> {
        let model_id = lease.model_id().to_string();
        let generator = CandidateGenerator::new(
            Arc::clone(lease.session()),
            constraints,
            options.temperature,
        );

        let mut best: Option<(String, f64, SequenceProperties)> = None;
        let mut evaluated = 0usize;

        while evaluated < options.max_candidates {
            if cancel.is_cancelled() {
                return Err(GenerateError::Cancelled {
                    model_id,
                    elapsed: started.elapsed(),
                    candidates_evaluated: evaluated,
                });
            }
            let Some(remaining) = options.max_wall_time.checked_sub(started.elapsed()) else {
                break;
            };

            let produced = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(GenerateError::Cancelled {
                        model_id,
                        elapsed: started.elapsed(),
                        candidates_evaluated: evaluated,
                    });
                }
                outcome = tokio::time::timeout(remaining, generator.produce()) => outcome,
            };

            let candidate = match produced {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    return Err(GenerateError::Inference {
                        model_id,
                        reason: e.to_string(),
                        elapsed: started.elapsed(),
                        candidates_evaluated: evaluated,
                    });
                }
                // Wall time ran out mid-inference.
                Err(_) => break,
            };

            let evaluation = self.evaluator.evaluate(&candidate, constraints);
            evaluated += 1;
            debug!(
                model_id = %model_id,
                candidate = evaluated,
                valid = evaluation.valid,
                score = evaluation.score,
                "candidate evaluated"
            );

            if evaluation.valid {
                // Strict comparison: ties go to the earliest-produced.
                let improves = best
                    .as_ref()
                    .is_none_or(|(_, score, _)| evaluation.score > *score);
                if improves {
                    best = Some((candidate, evaluation.score, evaluation.properties));
                }
            }

            // A perfect candidate past the minimum ends the search early.
            if evaluated >= options.min_candidates
                && best.as_ref().is_some_and(|(_, score, _)| *score >= 1.0)
            {
                break;
            }
        }

        match best {
            Some((sequence, score, properties)) => {
                let result = GenerationResult {
                    generation_id: Uuid::new_v4(),
                    model_id,
                    sequence,
                    score,
                    properties,
                    candidates_evaluated: evaluated,
                    elapsed: started.elapsed(),
                };
                info!(
                    generation_id = %result.generation_id,
                    model_id = %result.model_id,
                    score = result.score,
                    candidates_evaluated = result.candidates_evaluated,
                    "generation complete"
                );
                Ok(result)
            }
            None if evaluated == 0 => Err(GenerateError::Timeout {
                model_id,
                elapsed: started.elapsed(),
                candidates_evaluated: 0,
            }),
            None => Err(GenerateError::NoValidCandidate {
                model_id,
                elapsed: started.elapsed(),
                candidates_evaluated: evaluated,
            }),
        }
    }
}
