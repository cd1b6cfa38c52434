//! Pool configuration and file loading.
//!
//! Tunables follow the builder-with-defaults pattern. File loading goes
//! through the `config` crate with format auto-detection from the file
//! extension, so catalogues and tunables can live in TOML, YAML, or JSON.

use std::path::Path;
use std::time::Duration;

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::registry::ModelDescriptor;

/// Configuration for the model manager and its reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Hard ceiling on total resident model memory
    pub memory_budget_bytes: u64,
    /// Optional ceiling on accelerator memory (recorded for observability)
    #[serde(default)]
    pub accel_budget_bytes: Option<u64>,
    /// A load exceeding this transitions the slot to Error
    pub load_timeout_secs: u64,
    /// Loaded models idle longer than this are reaper candidates
    pub idle_timeout_secs: u64,
    /// How often the reaper scans for idle models
    pub reaper_interval_secs: u64,
    /// Models to load at startup
    #[serde(default)]
    pub preload_models: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: 6 * 1024 * 1024 * 1024, // 6 GB
            accel_budget_bytes: None,
            load_timeout_secs: 120,
            idle_timeout_secs: 600, // 10 minutes
            reaper_interval_secs: 60, // Check every minute
            preload_models: vec![],
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_budget_bytes(mut self, bytes: u64) -> Self {
        self.memory_budget_bytes = bytes;
        self
    }

    pub fn with_load_timeout_secs(mut self, secs: u64) -> Self {
        self.load_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    pub fn with_reaper_interval_secs(mut self, secs: u64) -> Self {
        self.reaper_interval_secs = secs;
        self
    }

    pub fn with_preload_models(mut self, models: Vec<String>) -> Self {
        self.preload_models = models;
        self
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.memory_budget_bytes == 0 {
            return Err(ModelError::Config("memory budget must be non-zero".into()));
        }
        if self.load_timeout_secs == 0 {
            return Err(ModelError::Config("load timeout must be non-zero".into()));
        }
        if self.reaper_interval_secs == 0 {
            return Err(ModelError::Config(
                "reaper interval must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Load pool tunables from a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        read_config(path.as_ref())
    }
}

/// Catalogue file shape: a `models` list of descriptors.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    models: Vec<ModelDescriptor>,
}

/// Load model descriptors from a configuration file.
///
/// Loader collaborators are injected in code afterwards; the file only
/// declares the immutable descriptor fields.
pub fn load_descriptors(path: impl AsRef<Path>) -> ModelResult<Vec<ModelDescriptor>> {
    let file: CatalogFile = read_config(path.as_ref())?;
    Ok(file.models)
}

fn detect_format(path: &Path) -> ModelResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ModelError::Config(format!("no file extension: {}", path.display())))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        other => Err(ModelError::Config(format!(
            "unsupported config format: {other}"
        ))),
    }
}

fn read_config<T: serde::de::DeserializeOwned>(path: &Path) -> ModelResult<T> {
    let format = detect_format(path)?;
    let path_str = path.to_string_lossy();

    Config::builder()
        .add_source(File::new(&path_str, format))
        .build()
        .map_err(|e| ModelError::Config(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ModelError::Config(e.to_string()))
}
