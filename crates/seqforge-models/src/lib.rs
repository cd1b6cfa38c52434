//! SeqForge model lifecycle management.
//!
//! This crate owns everything between "a model identifier" and "a resident,
//! usable model session": the configured catalogue, per-model slot state,
//! memory-budget admission and LRU eviction, the public `ModelManager`
//! orchestrator, and the background reaper that unloads idle models.
//!
//! Actual model materialization and inference are collaborator concerns,
//! injected through the [`loader::ModelLoader`] and [`loader::SequenceModel`]
//! traits at catalogue registration time.

// registry module - configured model catalogue
pub mod registry;

// slot module - per-model runtime state
pub mod slot;

// memory module - budget accounting and eviction planning
pub mod memory;

// loader module - collaborator traits (load/unload/infer)
pub mod loader;

// manager module - acquire/release orchestration
pub mod manager;

// reaper module - periodic idle eviction
pub mod reaper;

// clock module - injectable time source
pub mod clock;

// config module - tunables and file loading
pub mod config;

pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PoolConfig;
pub use error::{ModelError, ModelResult};
pub use loader::{LoadedModel, ModelLoader, SampleOptions, SequenceModel};
pub use manager::{ModelLease, ModelManager};
pub use reaper::IdleReaper;
pub use registry::{Capability, CatalogBuilder, ModelCatalog, ModelDescriptor};
pub use slot::{ModelStatus, SlotState, StatusReport};
