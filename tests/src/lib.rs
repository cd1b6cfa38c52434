//! SeqForge testing utilities.
//!
//! Shared mock loaders and model sessions for exercising the lifecycle
//! manager and the generation pipeline without real models.

use std::sync::Once;

pub mod models;

pub use models::{MockLoader, ScriptedModel};

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`. Safe to call from
/// every test; only the first call does anything.
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}
