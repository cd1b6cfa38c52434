//! Pure constraint scoring.
//!
//! Hard checks invalidate a candidate outright; soft checks multiply
//! clamped factors into a score in [0, 1]. Evaluation depends only on
//! the candidate text, the constraints, and the fixed property tables,
//! so identical candidates always score identically.

use crate::constraints::GenerationConstraints;
use crate::properties::{CompositionKey, SequenceProperties};

const DEFAULT_SCORE_FLOOR: f64 = 0.1;

/// Outcome of evaluating one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// False when any hard constraint failed; score is 0 in that case
    pub valid: bool,
    /// Product of soft factors, in [0, 1]
    pub score: f64,
    /// Human-readable reasons for hard-check failures
    pub hard_failures: Vec<String>,
    pub properties: SequenceProperties,
}

/// Scores candidates against declarative constraints.
#[derive(Debug, Clone)]
pub struct ConstraintEvaluator {
    /// Minimum per-factor contribution, so one soft miss never zeroes
    /// the whole score
    floor: f64,
}

impl Default for ConstraintEvaluator {
    fn default() -> Self {
        Self {
            floor: DEFAULT_SCORE_FLOOR,
        }
    }
}

impl ConstraintEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor.clamp(0.0, 1.0);
        self
    }

    pub fn evaluate(
        &self,
        candidate: &str,
        constraints: &GenerationConstraints,
    ) -> Evaluation {
        let properties = SequenceProperties::compute(candidate);
        let mut hard_failures = Vec::new();

        if properties.length < constraints.min_length
            || properties.length > constraints.max_length
        {
            hard_failures.push(format!(
                "length {} outside [{}, {}]",
                properties.length, constraints.min_length, constraints.max_length
            ));
        }
        for motif in &constraints.forbidden_motifs {
            if candidate.contains(motif.as_str()) {
                hard_failures.push(format!("forbidden motif {motif:?} present"));
            }
        }
        for motif in &constraints.required_motifs {
            if !candidate.contains(motif.as_str()) {
                hard_failures.push(format!("required motif {motif:?} absent"));
            }
        }

        if !hard_failures.is_empty() {
            return Evaluation {
                valid: false,
                score: 0.0,
                hard_failures,
                properties,
            };
        }

        // Keys and names are checked by GenerationConstraints::validate
        // before any candidate is produced; unparseable entries cannot
        // reach this point.
        let mut score = 1.0;
        for (key, target) in &constraints.composition {
            let Some(key) = CompositionKey::parse(key) else {
                continue;
            };
            let actual = properties.composition_fraction(key);
            score *= (1.0 - (actual - target).abs()).max(self.floor);
        }
        for (name, target) in &constraints.properties {
            let Some(actual) = properties.named(name) else {
                continue;
            };
            let factor = 1.0 - (actual - target).abs() / target.abs().max(1.0);
            score *= factor.max(self.floor);
        }

        Evaluation {
            valid: true,
            score: score.clamp(0.0, 1.0),
            hard_failures,
            properties,
        }
    }
}
