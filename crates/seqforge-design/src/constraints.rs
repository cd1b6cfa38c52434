//! Declarative generation constraints.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{GenerateError, GenerateResult};
use crate::properties::{sanitize, CompositionKey, PROPERTY_NAMES};

/// User-supplied constraints for one generation request.
///
/// Length bounds and motif checks are hard constraints; composition and
/// property targets are soft, contributing continuous score factors.
/// Composition keys are either a single canonical residue ("A") or a
/// residue class name ("hydrophobic"). Fractions need not sum to 1; each
/// target is checked independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConstraints {
    /// Inclusive length window
    pub min_length: usize,
    pub max_length: usize,
    /// Target fraction per residue or class, each in [0, 1]
    #[serde(default)]
    pub composition: BTreeMap<String, f64>,
    /// Target value per named numeric property
    #[serde(default)]
    pub properties: BTreeMap<String, f64>,
    /// Substrings that must not appear
    #[serde(default)]
    pub forbidden_motifs: BTreeSet<String>,
    /// Substrings that must appear
    #[serde(default)]
    pub required_motifs: BTreeSet<String>,
    /// Optional seed prefix handed to the model
    #[serde(default)]
    pub template: Option<String>,
}

impl GenerationConstraints {
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length,
            max_length,
            composition: BTreeMap::new(),
            properties: BTreeMap::new(),
            forbidden_motifs: BTreeSet::new(),
            required_motifs: BTreeSet::new(),
            template: None,
        }
    }

    pub fn with_composition(mut self, key: impl Into<String>, target: f64) -> Self {
        self.composition.insert(key.into(), target);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, target: f64) -> Self {
        self.properties.insert(name.into(), target);
        self
    }

    pub fn with_forbidden_motif(mut self, motif: impl Into<String>) -> Self {
        self.forbidden_motifs.insert(motif.into());
        self
    }

    pub fn with_required_motif(mut self, motif: impl Into<String>) -> Self {
        self.required_motifs.insert(motif.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn validate(&self) -> GenerateResult<()> {
        if self.min_length < 1 {
            return Err(invalid("min_length must be at least 1"));
        }
        if self.min_length > self.max_length {
            return Err(invalid(format!(
                "length window is empty: min {} > max {}",
                self.min_length, self.max_length
            )));
        }
        for (key, target) in &self.composition {
            if CompositionKey::parse(key).is_none() {
                return Err(invalid(format!(
                    "unknown composition key: {key:?} (expected a canonical residue or class name)"
                )));
            }
            if !(0.0..=1.0).contains(target) {
                return Err(invalid(format!(
                    "composition target for {key:?} must be in [0, 1], got {target}"
                )));
            }
        }
        for (name, target) in &self.properties {
            if !PROPERTY_NAMES.contains(&name.as_str()) {
                return Err(invalid(format!("unknown property target: {name:?}")));
            }
            if !target.is_finite() {
                return Err(invalid(format!(
                    "property target for {name:?} must be finite"
                )));
            }
        }
        for motif in self.forbidden_motifs.iter().chain(&self.required_motifs) {
            if motif.is_empty() {
                return Err(invalid("motifs must not be empty"));
            }
        }
        // Forbidden motifs may be arbitrary strings: a non-canonical one
        // simply never matches sanitized output. A required motif must be
        // satisfiable, so it gets the stricter checks.
        for motif in &self.required_motifs {
            if sanitize(motif) != *motif {
                return Err(invalid(format!(
                    "required motif {motif:?} contains non-canonical residues"
                )));
            }
            if motif.len() > self.max_length {
                return Err(invalid(format!(
                    "required motif {motif:?} is longer than max_length"
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> GenerateError {
    GenerateError::InvalidConstraints(message.into())
}
