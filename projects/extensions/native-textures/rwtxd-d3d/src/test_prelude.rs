//! Common test imports and utilities

pub use rstest::rstest;
pub use rwtxd_api::{Engine, EngineConfig, RecordingWarningManager};
pub use std::sync::Arc;

/// Creates an engine that records warnings.
pub(crate) fn recording_engine(config: EngineConfig) -> (Engine, Arc<RecordingWarningManager>) {
    let engine = Engine::with_config(config);
    let warnings = Arc::new(RecordingWarningManager::new());
    engine.set_warning_manager(warnings.clone());
    (engine, warnings)
}
