//! Configured model catalogue.
//!
//! The catalogue is built once at startup and never mutated afterwards.
//! Each entry pairs an immutable [`ModelDescriptor`] with the loader
//! collaborator that knows how to materialize that model. Registration
//! order is preserved; eviction uses it as the deterministic tie-break
//! for slots that have never been used.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::loader::ModelLoader;

/// What a catalogued model can do.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Sequence generation
    Generation,
    /// Embedding extraction
    Embedding,
    /// Structure prediction
    StructurePrediction,
    /// Sequence optimization
    Optimization,
}

/// Immutable description of one model, defined at configuration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique identifier (e.g. "protgpt2")
    pub id: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Declared capability set
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    /// Declared memory cost estimate in bytes
    pub declared_bytes: u64,
    /// Declared accelerator-memory cost in bytes, if any
    #[serde(default)]
    pub declared_accel_bytes: Option<u64>,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, declared_bytes: u64) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            capabilities: BTreeSet::new(),
            declared_bytes,
            declared_accel_bytes: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn with_accel_bytes(mut self, bytes: u64) -> Self {
        self.declared_accel_bytes = Some(bytes);
        self
    }

    /// Check whether this model advertises the given capability.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

pub(crate) struct CatalogEntry {
    pub(crate) descriptor: ModelDescriptor,
    pub(crate) loader: Arc<dyn ModelLoader>,
}

/// The frozen model catalogue.
pub struct ModelCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("models", &self.ids().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ModelCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Position of the model in registration order.
    pub fn index_of(&self, model_id: &str) -> Option<usize> {
        self.index.get(model_id).copied()
    }

    pub fn descriptor(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.index_of(model_id)
            .map(|idx| &self.entries[idx].descriptor)
    }

    pub(crate) fn descriptor_at(&self, idx: usize) -> &ModelDescriptor {
        &self.entries[idx].descriptor
    }

    pub(crate) fn loader_at(&self, idx: usize) -> Arc<dyn ModelLoader> {
        Arc::clone(&self.entries[idx].loader)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Model identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.descriptor.id.as_str())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }
}

/// Builder collecting descriptor/loader pairs before the catalogue freezes.
pub struct CatalogBuilder {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl CatalogBuilder {
    /// Register one model. Fails on duplicate identifiers, empty
    /// identifiers, or a zero declared cost.
    pub fn register(
        mut self,
        descriptor: ModelDescriptor,
        loader: Arc<dyn ModelLoader>,
    ) -> ModelResult<Self> {
        if descriptor.id.is_empty() {
            return Err(ModelError::Config("model id must not be empty".into()));
        }
        if descriptor.declared_bytes == 0 {
            return Err(ModelError::Config(format!(
                "model {} declares a zero memory cost",
                descriptor.id
            )));
        }
        if self.index.contains_key(&descriptor.id) {
            return Err(ModelError::Config(format!(
                "duplicate model id: {}",
                descriptor.id
            )));
        }

        self.index.insert(descriptor.id.clone(), self.entries.len());
        self.entries.push(CatalogEntry { descriptor, loader });
        Ok(self)
    }

    pub fn build(self) -> ModelResult<ModelCatalog> {
        if self.entries.is_empty() {
            return Err(ModelError::Config("catalogue has no models".into()));
        }
        Ok(ModelCatalog {
            entries: self.entries,
            index: self.index,
        })
    }
}
