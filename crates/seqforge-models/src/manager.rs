//! The model lifecycle manager.
//!
//! Owns the slot table and enforces the three core guarantees: at most
//! one load in flight per model, total charged memory kept within the
//! configured budget (evicting least-recently-used idle models to make
//! room), and no eviction of a model with outstanding leases.
//!
//! Locking discipline: per-model load semaphores are acquired before the
//! slot table mutex, and the table mutex is never held while waiting on
//! a semaphore. Eviction unloads run under the table mutex; loader calls
//! for admissions run outside it with the slot parked in `Loading` and
//! its declared cost charged as a reservation.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::PoolConfig;
use crate::error::{ModelError, ModelResult};
use crate::loader::SequenceModel;
use crate::memory::{plan_admission, Admission, SlotMeta};
use crate::registry::{Capability, ModelCatalog, ModelDescriptor};
use crate::slot::{ModelSlot, ModelStatus, SlotState, StatusReport};

/// A loan of one resident model session.
///
/// The slot backing this lease cannot be evicted until the lease is
/// handed back through [`ModelManager::release`].
pub struct ModelLease {
    pub(crate) model_id: String,
    pub(crate) session: Arc<dyn SequenceModel>,
}

impl ModelLease {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn session(&self) -> &Arc<dyn SequenceModel> {
        &self.session
    }
}

impl std::fmt::Debug for ModelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLease")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

struct ManagerInner {
    catalog: ModelCatalog,
    config: PoolConfig,
    clock: Arc<dyn Clock>,
    slots: Mutex<Vec<ModelSlot>>,
    /// One permit per model; serializes loads so concurrent callers
    /// join the winner's result instead of loading twice
    loading_locks: Vec<Semaphore>,
}

/// Shared handle to the lifecycle manager. Cloning is cheap.
#[derive(Clone)]
pub struct ModelManager {
    inner: Arc<ManagerInner>,
}

impl ModelManager {
    pub fn new(catalog: ModelCatalog, config: PoolConfig) -> ModelResult<Self> {
        Self::with_clock(catalog, config, Arc::new(SystemClock))
    }

    /// Construct with an injected clock. Tests use [`crate::ManualClock`]
    /// to drive idle-based eviction deterministically.
    pub fn with_clock(
        catalog: ModelCatalog,
        config: PoolConfig,
        clock: Arc<dyn Clock>,
    ) -> ModelResult<Self> {
        config.validate()?;

        let slots = catalog
            .ids()
            .enumerate()
            .map(|(idx, id)| ModelSlot::new(id.to_string(), idx))
            .collect();
        let loading_locks = (0..catalog.len()).map(|_| Semaphore::new(1)).collect();

        Ok(Self {
            inner: Arc::new(ManagerInner {
                catalog,
                config,
                clock,
                slots: Mutex::new(slots),
                loading_locks,
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn descriptor(&self, model_id: &str) -> ModelResult<&ModelDescriptor> {
        self.inner
            .catalog
            .descriptor(model_id)
            .ok_or_else(|| ModelError::NotFound(model_id.to_string()))
    }

    /// Fail unless the catalogued model advertises `capability`.
    pub fn require_capability(
        &self,
        model_id: &str,
        capability: Capability,
    ) -> ModelResult<()> {
        let descriptor = self.descriptor(model_id)?;
        if !descriptor.supports(capability) {
            return Err(ModelError::CapabilityMissing {
                model_id: model_id.to_string(),
                capability,
            });
        }
        Ok(())
    }

    /// Load the configured preload set, failing fast on the first error.
    ///
    /// Preloaded models are resident but unloaned, and their `last_used`
    /// stays unset until a caller actually acquires them.
    pub async fn initialize(&self) -> ModelResult<()> {
        let preload = self.inner.config.preload_models.clone();
        for model_id in &preload {
            let idx = self
                .inner
                .catalog
                .index_of(model_id)
                .ok_or_else(|| ModelError::NotFound(model_id.clone()))?;

            let _permit = self.load_permit(idx, model_id).await?;
            self.load_under_permit(idx, false).await?;
            info!(model_id = %model_id, "model preloaded");
        }
        Ok(())
    }

    /// Acquire a lease on a model, loading it first if necessary.
    pub async fn acquire(&self, model_id: &str) -> ModelResult<ModelLease> {
        let idx = self
            .inner
            .catalog
            .index_of(model_id)
            .ok_or_else(|| ModelError::NotFound(model_id.to_string()))?;

        // Fast path: already resident.
        {
            let mut slots = self.inner.slots.lock().await;
            if slots[idx].state == SlotState::Loaded {
                return self.grant_loan(&mut slots[idx]);
            }
        }

        let _permit = self.load_permit(idx, model_id).await?;
        let lease = self.load_under_permit(idx, true).await?;
        lease.ok_or_else(|| ModelError::LoadFailed {
            model_id: model_id.to_string(),
            reason: "lease not granted after load".into(),
        })
    }

    /// Hand back a lease, making its slot eligible for eviction again
    /// once no other loans remain.
    pub async fn release(&self, lease: ModelLease) -> ModelResult<()> {
        let idx = self
            .inner
            .catalog
            .index_of(&lease.model_id)
            .ok_or_else(|| ModelError::NotFound(lease.model_id.clone()))?;

        let mut slots = self.inner.slots.lock().await;
        let slot = &mut slots[idx];
        if slot.loans == 0 {
            return Err(ModelError::LoanUnderflow(lease.model_id));
        }
        slot.loans -= 1;
        slot.last_used = Some(self.inner.clock.now());
        Ok(())
    }

    /// Unload every loaded model idle past the configured timeout.
    /// Returns the number of models unloaded.
    pub async fn evict_idle(&self) -> usize {
        let idle_timeout = self.inner.config.idle_timeout();
        let now = self.inner.clock.now();

        let mut slots = self.inner.slots.lock().await;
        let victims: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_evictable())
            .filter(|(_, slot)| {
                // Preloaded-but-never-used slots stay resident.
                slot.last_used
                    .is_some_and(|t| now.saturating_duration_since(t) >= idle_timeout)
            })
            .map(|(idx, _)| idx)
            .collect();

        for &idx in &victims {
            self.unload_at(&mut slots, idx).await;
        }
        if !victims.is_empty() {
            info!(count = victims.len(), "idle models evicted");
        }
        victims.len()
    }

    /// Force-unload every resident model. Outstanding loans are logged
    /// but do not block shutdown.
    pub async fn shutdown(&self) {
        let mut slots = self.inner.slots.lock().await;
        for idx in 0..slots.len() {
            if slots[idx].state != SlotState::Loaded {
                continue;
            }
            if slots[idx].loans > 0 {
                warn!(
                    model_id = %slots[idx].model_id,
                    loans = slots[idx].loans,
                    "shutting down with outstanding loans"
                );
            }
            self.unload_at(&mut slots, idx).await;
        }
        info!("model manager shut down");
    }

    /// Point-in-time view of every slot.
    pub async fn status(&self) -> StatusReport {
        let slots = self.inner.slots.lock().await;
        let models = slots
            .iter()
            .map(|slot| ModelStatus {
                model_id: slot.model_id.clone(),
                state: slot.state.clone(),
                resident_bytes: slot.resident_bytes,
                declared_bytes: self
                    .inner
                    .catalog
                    .descriptor_at(slot.registration_index)
                    .declared_bytes,
                loans: slot.loans,
                last_used: slot.last_used,
                load_duration: slot.load_duration,
            })
            .collect();

        StatusReport {
            collected_at: Utc::now(),
            budget_bytes: self.inner.config.memory_budget_bytes,
            resident_bytes: slots.iter().map(|s| s.resident_bytes).sum(),
            models,
        }
    }

    async fn load_permit(
        &self,
        idx: usize,
        model_id: &str,
    ) -> ModelResult<tokio::sync::SemaphorePermit<'_>> {
        self.inner.loading_locks[idx]
            .acquire()
            .await
            .map_err(|_| ModelError::LoadFailed {
                model_id: model_id.to_string(),
                reason: "load serialization lock closed".into(),
            })
    }

    /// Run the admission/load protocol for one slot. Must be called with
    /// the slot's load permit held.
    async fn load_under_permit(
        &self,
        idx: usize,
        take_loan: bool,
    ) -> ModelResult<Option<ModelLease>> {
        let inner = &self.inner;
        let descriptor = inner.catalog.descriptor_at(idx).clone();
        let need = descriptor.declared_bytes;

        {
            let mut slots = inner.slots.lock().await;

            // Another caller may have finished the load while we waited
            // on the permit.
            if slots[idx].state == SlotState::Loaded {
                if take_loan {
                    return self.grant_loan(&mut slots[idx]).map(Some);
                }
                return Ok(None);
            }

            let metas: Vec<SlotMeta> = slots.iter().map(|s| s.meta()).collect();
            match plan_admission(&metas, inner.config.memory_budget_bytes, need) {
                Ok(Admission::Admit) => {}
                Ok(Admission::Evict(victims)) => {
                    info!(
                        model_id = %descriptor.id,
                        victims = ?victims,
                        "evicting to admit model"
                    );
                    for victim in &victims {
                        if let Some(victim_idx) = inner.catalog.index_of(victim) {
                            self.unload_at(&mut slots, victim_idx).await;
                        }
                    }
                }
                Err(shortfall) => {
                    return Err(ModelError::CapacityExceeded {
                        model_id: descriptor.id.clone(),
                        needed_bytes: shortfall.needed_bytes,
                        budget_bytes: shortfall.budget_bytes,
                        evictable_bytes: shortfall.evictable_bytes,
                    });
                }
            }

            slots[idx].state = SlotState::Loading;
            slots[idx].reserved_bytes = need;
        }

        let loader = inner.catalog.loader_at(idx);
        let started = Instant::now();
        let outcome =
            tokio::time::timeout(inner.config.load_timeout(), loader.load(&descriptor)).await;

        let mut slots = inner.slots.lock().await;
        slots[idx].reserved_bytes = 0;

        match outcome {
            Ok(Ok(loaded)) => {
                let resident = loaded.resident_bytes;
                let elapsed = started.elapsed();
                {
                    let slot = &mut slots[idx];
                    slot.state = SlotState::Loaded;
                    slot.resident_bytes = resident;
                    slot.session = Some(loaded.session);
                    slot.load_duration = Some(elapsed);
                }
                if resident > need {
                    warn!(
                        model_id = %descriptor.id,
                        declared_bytes = need,
                        resident_bytes = resident,
                        "model exceeded its declared memory estimate"
                    );
                }
                let charged: u64 = slots.iter().map(|s| s.charged_bytes()).sum();
                if charged > inner.config.memory_budget_bytes {
                    warn!(
                        charged_bytes = charged,
                        budget_bytes = inner.config.memory_budget_bytes,
                        "resident models exceed the memory budget"
                    );
                }
                info!(
                    model_id = %descriptor.id,
                    resident_bytes = resident,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "model loaded"
                );

                if take_loan {
                    return self.grant_loan(&mut slots[idx]).map(Some);
                }
                Ok(None)
            }
            Ok(Err(e)) => {
                let reason = e.to_string();
                slots[idx].state = SlotState::Error(reason.clone());
                warn!(model_id = %descriptor.id, error = %reason, "model load failed");
                Err(ModelError::LoadFailed {
                    model_id: descriptor.id.clone(),
                    reason,
                })
            }
            Err(_) => {
                let reason = format!(
                    "load timed out after {}s",
                    inner.config.load_timeout_secs
                );
                slots[idx].state = SlotState::Error(reason.clone());
                warn!(model_id = %descriptor.id, "model load timed out");
                Err(ModelError::LoadFailed {
                    model_id: descriptor.id.clone(),
                    reason,
                })
            }
        }
    }

    fn grant_loan(&self, slot: &mut ModelSlot) -> ModelResult<ModelLease> {
        let Some(session) = slot.session.as_ref() else {
            return Err(ModelError::LoadFailed {
                model_id: slot.model_id.clone(),
                reason: "resident session missing".into(),
            });
        };
        slot.loans += 1;
        slot.last_used = Some(self.inner.clock.now());
        Ok(ModelLease {
            model_id: slot.model_id.clone(),
            session: Arc::clone(session),
        })
    }

    /// Unload one slot in place. Unloader failures are logged and the
    /// slot is marked Unloaded regardless, so its budget charge is
    /// always released.
    async fn unload_at(&self, slots: &mut [ModelSlot], idx: usize) {
        let (session, freed) = {
            let slot = &mut slots[idx];
            let Some(session) = slot.session.take() else {
                slot.state = SlotState::Unloaded;
                slot.resident_bytes = 0;
                slot.last_used = None;
                return;
            };
            slot.state = SlotState::Unloading;
            (session, slot.resident_bytes)
        };

        let loader = self.inner.catalog.loader_at(idx);
        if let Err(e) = loader.unload(session).await {
            warn!(
                model_id = %slots[idx].model_id,
                error = %e,
                "unloader failed; dropping session anyway"
            );
        }

        let slot = &mut slots[idx];
        slot.state = SlotState::Unloaded;
        slot.resident_bytes = 0;
        slot.last_used = None;
        info!(model_id = %slot.model_id, freed_bytes = freed, "model unloaded");
    }
}
