//! Shared mock loaders and model sessions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use seqforge_models::{LoadedModel, ModelDescriptor, ModelLoader, SampleOptions, SequenceModel};

/// A model session that cycles through a fixed list of outputs.
///
/// The literal output `"!"` is replayed as an inference failure, so
/// scripts can mix successes and errors.
pub struct ScriptedModel {
    id: String,
    outputs: Vec<String>,
    cursor: Mutex<usize>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(id: impl Into<String>, outputs: &[&str]) -> Self {
        Self {
            id: id.into(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            cursor: Mutex::new(0),
            delay: None,
        }
    }

    /// Make every `sample` call sleep first, to exercise timeouts and
    /// cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SequenceModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn sample(
        &self,
        _options: &SampleOptions,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let output = {
            let mut cursor = self.cursor.lock();
            let output = self.outputs[*cursor % self.outputs.len()].clone();
            *cursor += 1;
            output
        };
        if output == "!" {
            return Err("scripted inference failure".into());
        }
        Ok(output)
    }
}

/// A loader with counters and injectable failures.
///
/// By default it reports the descriptor's declared estimate as the
/// observed resident size and serves sessions that echo a fixed output.
pub struct MockLoader {
    outputs: Vec<String>,
    loads: AtomicUsize,
    unloads: AtomicUsize,
    fail_loads_remaining: AtomicUsize,
    load_delay: Option<Duration>,
    resident_override: Option<u64>,
}

impl Default for MockLoader {
    fn default() -> Self {
        Self {
            outputs: vec!["MKTAYIAKQR".to_string()],
            loads: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            fail_loads_remaining: AtomicUsize::new(0),
            load_delay: None,
            resident_override: None,
        }
    }
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions produced by this loader will cycle these outputs.
    pub fn with_outputs(mut self, outputs: &[&str]) -> Self {
        self.outputs = outputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Report this resident size instead of the declared estimate.
    pub fn with_resident_bytes(mut self, bytes: u64) -> Self {
        self.resident_override = Some(bytes);
        self
    }

    /// Make the next `count` load attempts fail.
    pub fn fail_loads(&self, count: usize) {
        self.fail_loads_remaining.store(count, Ordering::SeqCst);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for MockLoader {
    async fn load(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<LoadedModel, Box<dyn std::error::Error + Send + Sync>> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_loads_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_loads_remaining
                .store(remaining - 1, Ordering::SeqCst);
            return Err(format!("mock load failure for {}", descriptor.id).into());
        }
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }

        let outputs: Vec<&str> = self.outputs.iter().map(|s| s.as_str()).collect();
        Ok(LoadedModel {
            session: Arc::new(ScriptedModel::new(descriptor.id.clone(), &outputs)),
            resident_bytes: self.resident_override.unwrap_or(descriptor.declared_bytes),
        })
    }

    async fn unload(
        &self,
        _session: Arc<dyn SequenceModel>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
