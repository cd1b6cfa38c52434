//! Amino-acid property tables and derived sequence properties.
//!
//! Everything here is pure and deterministic: the same sequence always
//! yields the same property values, which scoring depends on for
//! reproducible ranking.

use std::collections::BTreeMap;

use serde::Serialize;

/// The twenty canonical residues, in the conventional one-letter order.
pub const CANONICAL_RESIDUES: &str = "ACDEFGHIKLMNPQRSTVWY";

/// Peptide-bond condensation releases one water per bond.
const WATER_MASS: f64 = 18.015;

/// Average monoisotopic-free mass per residue, daltons.
fn residue_mass(residue: char) -> Option<f64> {
    let mass = match residue {
        'A' => 89.1,
        'R' => 174.2,
        'N' => 132.1,
        'D' => 133.1,
        'C' => 121.2,
        'E' => 147.1,
        'Q' => 146.2,
        'G' => 75.1,
        'H' => 155.2,
        'I' => 131.2,
        'L' => 131.2,
        'K' => 146.2,
        'M' => 149.2,
        'F' => 165.2,
        'P' => 115.1,
        'S' => 105.1,
        'T' => 119.1,
        'W' => 204.2,
        'Y' => 181.2,
        'V' => 117.1,
        _ => return None,
    };
    Some(mass)
}

/// Kyte-Doolittle hydropathy index.
fn hydropathy(residue: char) -> Option<f64> {
    let value = match residue {
        'A' => 1.8,
        'R' => -4.5,
        'N' => -3.5,
        'D' => -3.5,
        'C' => 2.5,
        'E' => -3.5,
        'Q' => -3.5,
        'G' => -0.4,
        'H' => -3.2,
        'I' => 4.5,
        'L' => 3.8,
        'K' => -3.9,
        'M' => 1.9,
        'F' => 2.8,
        'P' => -1.6,
        'S' => -0.8,
        'T' => -0.7,
        'W' => -0.9,
        'Y' => -1.3,
        'V' => 4.2,
        _ => return None,
    };
    Some(value)
}

/// Per-residue charge contribution at neutral pH. Histidine is treated
/// as half-protonated.
fn charge(residue: char) -> f64 {
    match residue {
        'D' | 'E' => -1.0,
        'K' | 'R' => 1.0,
        'H' => 0.5,
        _ => 0.0,
    }
}

/// Physicochemical residue classes usable as composition targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidueClass {
    Hydrophobic,
    Polar,
    Charged,
    Positive,
    Negative,
    Aromatic,
    Small,
    Large,
}

impl ResidueClass {
    /// Residues belonging to this class.
    pub fn members(&self) -> &'static str {
        match self {
            ResidueClass::Hydrophobic => "AILMFPWV",
            ResidueClass::Polar => "NQSTY",
            ResidueClass::Charged => "DEKR",
            ResidueClass::Positive => "KR",
            ResidueClass::Negative => "DE",
            ResidueClass::Aromatic => "FWY",
            ResidueClass::Small => "AGCS",
            ResidueClass::Large => "FWYR",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let class = match name.to_lowercase().as_str() {
            "hydrophobic" => ResidueClass::Hydrophobic,
            "polar" => ResidueClass::Polar,
            "charged" => ResidueClass::Charged,
            "positive" => ResidueClass::Positive,
            "negative" => ResidueClass::Negative,
            "aromatic" => ResidueClass::Aromatic,
            "small" => ResidueClass::Small,
            "large" => ResidueClass::Large,
            _ => return None,
        };
        Some(class)
    }
}

/// A parsed composition-target key: either one residue or a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionKey {
    Residue(char),
    Class(ResidueClass),
}

impl CompositionKey {
    pub fn parse(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            let upper = c.to_ascii_uppercase();
            if CANONICAL_RESIDUES.contains(upper) {
                return Some(CompositionKey::Residue(upper));
            }
            return None;
        }
        ResidueClass::parse(key).map(CompositionKey::Class)
    }
}

/// Names accepted as numeric property targets.
pub const PROPERTY_NAMES: [&str; 5] = [
    "length",
    "molecular_weight",
    "hydrophobicity",
    "net_charge",
    "isoelectric_point",
];

/// Strip a raw model output down to canonical residues, uppercased.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| CANONICAL_RESIDUES.contains(*c))
        .collect()
}

/// Derived numeric properties of one sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceProperties {
    pub length: usize,
    /// Daltons, corrected for peptide-bond water loss
    pub molecular_weight: f64,
    /// Mean Kyte-Doolittle hydropathy
    pub hydrophobicity: f64,
    pub net_charge: f64,
    /// Crude estimate, clamped to [3.0, 12.0]
    pub isoelectric_point: f64,
    counts: BTreeMap<char, usize>,
}

impl SequenceProperties {
    /// Compute all properties for a sanitized sequence. Non-canonical
    /// characters are ignored.
    pub fn compute(sequence: &str) -> Self {
        let mut counts: BTreeMap<char, usize> = BTreeMap::new();
        let mut mass_sum = 0.0;
        let mut hydropathy_sum = 0.0;
        let mut net_charge = 0.0;
        let mut length = 0usize;

        for c in sequence.chars().map(|c| c.to_ascii_uppercase()) {
            let (Some(mass), Some(kd)) = (residue_mass(c), hydropathy(c)) else {
                continue;
            };
            *counts.entry(c).or_insert(0) += 1;
            mass_sum += mass;
            hydropathy_sum += kd;
            net_charge += charge(c);
            length += 1;
        }

        if length == 0 {
            return Self {
                length: 0,
                molecular_weight: 0.0,
                hydrophobicity: 0.0,
                net_charge: 0.0,
                isoelectric_point: 7.0,
                counts,
            };
        }

        let len = length as f64;
        let molecular_weight = mass_sum - (len - 1.0) * WATER_MASS;
        let positive: usize = "KR".chars().map(|c| counts.get(&c).copied().unwrap_or(0)).sum();
        let negative: usize = "DE".chars().map(|c| counts.get(&c).copied().unwrap_or(0)).sum();
        let isoelectric_point =
            (7.0 + (positive as f64 - negative as f64) / len * 3.0).clamp(3.0, 12.0);

        Self {
            length,
            molecular_weight,
            hydrophobicity: hydropathy_sum / len,
            net_charge,
            isoelectric_point,
            counts,
        }
    }

    /// Fraction of the sequence made up of one residue.
    pub fn residue_fraction(&self, residue: char) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        let count = self
            .counts
            .get(&residue.to_ascii_uppercase())
            .copied()
            .unwrap_or(0);
        count as f64 / self.length as f64
    }

    /// Fraction of the sequence made up of any member of a class.
    pub fn class_fraction(&self, class: ResidueClass) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        let count: usize = class
            .members()
            .chars()
            .map(|c| self.counts.get(&c).copied().unwrap_or(0))
            .sum();
        count as f64 / self.length as f64
    }

    pub fn composition_fraction(&self, key: CompositionKey) -> f64 {
        match key {
            CompositionKey::Residue(c) => self.residue_fraction(c),
            CompositionKey::Class(class) => self.class_fraction(class),
        }
    }

    /// Look up a numeric property by its declared name.
    pub fn named(&self, name: &str) -> Option<f64> {
        let value = match name {
            "length" => self.length as f64,
            "molecular_weight" => self.molecular_weight,
            "hydrophobicity" => self.hydrophobicity,
            "net_charge" => self.net_charge,
            "isoelectric_point" => self.isoelectric_point,
            _ => return None,
        };
        Some(value)
    }
}
