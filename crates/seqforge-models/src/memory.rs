//! Budget accounting and eviction planning.
//!
//! Admission decisions are pure functions over a snapshot of slot
//! metadata, separated from the locking discipline that protects the
//! live table. The caller takes the snapshot under the table's
//! exclusive section, so a slot that gained a loan during the decision
//! can never be selected.

use std::time::Instant;

/// Snapshot of the fields eviction planning needs from one slot.
#[derive(Debug, Clone)]
pub(crate) struct SlotMeta {
    pub(crate) model_id: String,
    pub(crate) registration_index: usize,
    /// Loaded with zero loans
    pub(crate) evictable: bool,
    pub(crate) resident_bytes: u64,
    /// Resident plus in-flight reservation
    pub(crate) charged_bytes: u64,
    pub(crate) last_used: Option<Instant>,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Fits within the budget as-is
    Admit,
    /// Fits after evicting these models, in eviction order
    Evict(Vec<String>),
}

/// Even maximal eviction cannot make room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CapacityShortfall {
    pub(crate) needed_bytes: u64,
    pub(crate) budget_bytes: u64,
    pub(crate) evictable_bytes: u64,
}

/// Decide whether `requested` bytes can be admitted under `budget`.
///
/// Victims are selected strictly least-recently-used among evictable
/// slots. Slots never used this run sort before any used slot, in
/// registration order, so the choice is deterministic.
pub(crate) fn plan_admission(
    slots: &[SlotMeta],
    budget: u64,
    requested: u64,
) -> Result<Admission, CapacityShortfall> {
    let charged: u64 = slots.iter().map(|s| s.charged_bytes).sum();
    if charged + requested <= budget {
        return Ok(Admission::Admit);
    }

    let excess = charged + requested - budget;

    let mut candidates: Vec<&SlotMeta> = slots
        .iter()
        .filter(|s| s.evictable && s.resident_bytes > 0)
        .collect();
    candidates.sort_by(|a, b| match (a.last_used, b.last_used) {
        (None, None) => a.registration_index.cmp(&b.registration_index),
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y).then(a.registration_index.cmp(&b.registration_index)),
    });

    let mut victims = Vec::new();
    let mut freed: u64 = 0;
    for slot in &candidates {
        if freed >= excess {
            break;
        }
        freed += slot.resident_bytes;
        victims.push(slot.model_id.clone());
    }

    if freed < excess {
        return Err(CapacityShortfall {
            needed_bytes: requested,
            budget_bytes: budget,
            evictable_bytes: candidates.iter().map(|s| s.resident_bytes).sum(),
        });
    }

    Ok(Admission::Evict(victims))
}
