//! Per-model runtime slot state.
//!
//! One slot exists per catalogued model, created Unloaded at startup and
//! destroyed only at shutdown. All transitions are driven by the
//! `ModelManager` under the slot table's exclusive section.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::loader::SequenceModel;
use crate::memory::SlotMeta;

/// Lifecycle state of one model slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    /// Not resident
    Unloaded,
    /// A load is in flight
    Loading,
    /// Resident and usable
    Loaded,
    /// An unload is in flight
    Unloading,
    /// The last load attempt failed; retry on next acquire
    Error(String),
}

impl std::fmt::Display for SlotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotState::Unloaded => write!(f, "unloaded"),
            SlotState::Loading => write!(f, "loading"),
            SlotState::Loaded => write!(f, "loaded"),
            SlotState::Unloading => write!(f, "unloading"),
            SlotState::Error(detail) => write!(f, "error: {detail}"),
        }
    }
}

pub(crate) struct ModelSlot {
    pub(crate) model_id: String,
    pub(crate) registration_index: usize,
    pub(crate) state: SlotState,
    /// Observed resident size; 0 unless Loaded
    pub(crate) resident_bytes: u64,
    /// Declared estimate charged while a load is in flight
    pub(crate) reserved_bytes: u64,
    /// Outstanding leases; a slot with loans > 0 is never evicted
    pub(crate) loans: u32,
    /// Set on every successful acquire, cleared on unload
    pub(crate) last_used: Option<Instant>,
    /// Observed duration of the most recent successful load
    pub(crate) load_duration: Option<Duration>,
    pub(crate) session: Option<Arc<dyn SequenceModel>>,
}

impl ModelSlot {
    pub(crate) fn new(model_id: String, registration_index: usize) -> Self {
        Self {
            model_id,
            registration_index,
            state: SlotState::Unloaded,
            resident_bytes: 0,
            reserved_bytes: 0,
            loans: 0,
            last_used: None,
            load_duration: None,
            session: None,
        }
    }

    /// Resident plus in-flight reservation, as charged against the budget.
    pub(crate) fn charged_bytes(&self) -> u64 {
        self.resident_bytes + self.reserved_bytes
    }

    pub(crate) fn is_evictable(&self) -> bool {
        self.state == SlotState::Loaded && self.loans == 0
    }

    pub(crate) fn meta(&self) -> SlotMeta {
        SlotMeta {
            model_id: self.model_id.clone(),
            registration_index: self.registration_index,
            evictable: self.is_evictable(),
            resident_bytes: self.resident_bytes,
            charged_bytes: self.charged_bytes(),
            last_used: self.last_used,
        }
    }
}

/// Observable status of one model slot.
#[derive(Debug, Clone)]
pub struct ModelStatus {
    pub model_id: String,
    pub state: SlotState,
    pub resident_bytes: u64,
    pub declared_bytes: u64,
    pub loans: u32,
    pub last_used: Option<Instant>,
    pub load_duration: Option<Duration>,
}

/// Point-in-time view of the whole slot table.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub collected_at: DateTime<Utc>,
    pub budget_bytes: u64,
    pub resident_bytes: u64,
    pub models: Vec<ModelStatus>,
}
