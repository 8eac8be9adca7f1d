//! # Engine Interface
//!
//! The context handed to every codec operation. It owns:
//!
//! - the runtime [`EngineConfig`]
//! - the warning dispatcher ([`WarningManager`])
//! - the pixel allocator ([`Engine::allocate_pixels`])
//! - the native texture type registry
//!
//! Native textures never store the engine; it is passed by reference into each call.

use crate::error::{TxdError, TxdResult};
use crate::native::NativeTextureType;
use crate::version::LibraryVersion;
use parking_lot::{Mutex, RwLock};
use std::string::String;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::vec::Vec;

/// Default ceiling of a single pixel allocation (256 MiB).
pub const DEFAULT_MAX_PIXEL_ALLOCATION: usize = 256 * 1024 * 1024;

/// Runtime configuration of an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Version assigned to newly constructed native textures.
    pub version: LibraryVersion,
    /// Highest warning level that is dispatched. 0 silences everything.
    pub warning_level: u32,
    /// Suppresses warnings of level 2 and above regardless of `warning_level`.
    pub ignore_secure_warnings: bool,
    /// Truncate blocks that declare more bytes than the stream holds instead of failing.
    pub lenient_block_acquisition: bool,
    /// Skip read bounds checks inside blocks.
    pub ignore_block_regions: bool,
    /// Convert pixel data that the target platform cannot store as is.
    pub fix_incompatible_rasters: bool,
    /// Largest single pixel allocation in bytes.
    pub max_pixel_allocation: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: LibraryVersion::default(),
            warning_level: 3,
            ignore_secure_warnings: false,
            lenient_block_acquisition: true,
            ignore_block_regions: false,
            fix_incompatible_rasters: true,
            max_pixel_allocation: DEFAULT_MAX_PIXEL_ALLOCATION,
        }
    }
}

impl EngineConfig {
    /// Sets [`EngineConfig::version`].
    pub fn with_version(mut self, version: LibraryVersion) -> Self {
        self.version = version;
        self
    }

    /// Sets [`EngineConfig::warning_level`].
    pub fn with_warning_level(mut self, level: u32) -> Self {
        self.warning_level = level;
        self
    }

    /// Sets [`EngineConfig::ignore_secure_warnings`].
    pub fn with_ignore_secure_warnings(mut self, ignore: bool) -> Self {
        self.ignore_secure_warnings = ignore;
        self
    }

    /// Sets [`EngineConfig::lenient_block_acquisition`].
    pub fn with_lenient_block_acquisition(mut self, lenient: bool) -> Self {
        self.lenient_block_acquisition = lenient;
        self
    }

    /// Sets [`EngineConfig::ignore_block_regions`].
    pub fn with_ignore_block_regions(mut self, ignore: bool) -> Self {
        self.ignore_block_regions = ignore;
        self
    }

    /// Sets [`EngineConfig::fix_incompatible_rasters`].
    pub fn with_fix_incompatible_rasters(mut self, fix: bool) -> Self {
        self.fix_incompatible_rasters = fix;
        self
    }

    /// Sets [`EngineConfig::max_pixel_allocation`].
    pub fn with_max_pixel_allocation(mut self, bytes: usize) -> Self {
        self.max_pixel_allocation = bytes;
        self
    }
}

/// Receives engine warnings that passed the level gate.
pub trait WarningManager: Send + Sync {
    /// Handles one warning.
    fn on_warning(&self, level: u32, message: &str);
}

/// Forwards warnings to the [`log`] facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWarningManager;

impl WarningManager for LogWarningManager {
    fn on_warning(&self, level: u32, message: &str) {
        log::warn!(target: "rwtxd", "[level {level}] {message}");
    }
}

/// Stores every warning; useful for tests and embedders that show warnings later.
#[derive(Debug, Default)]
pub struct RecordingWarningManager {
    warnings: Mutex<Vec<String>>,
}

impl RecordingWarningManager {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of all recorded warnings, oldest first.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }

    /// Number of recorded warnings.
    pub fn len(&self) -> usize {
        self.warnings.lock().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.warnings.lock().is_empty()
    }

    /// Removes and returns all recorded warnings.
    pub fn take(&self) -> Vec<String> {
        core::mem::take(&mut *self.warnings.lock())
    }
}

impl WarningManager for RecordingWarningManager {
    fn on_warning(&self, level: u32, message: &str) {
        log::debug!(target: "rwtxd", "recorded warning [level {level}] {message}");
        self.warnings.lock().push(message.into());
    }
}

/// Shared context of all native texture operations.
pub struct Engine {
    config: RwLock<EngineConfig>,
    warnings: RwLock<Arc<dyn WarningManager>>,
    registry: RwLock<Vec<Arc<dyn NativeTextureType>>>,
    registry_sealed: AtomicBool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &*self.config.read())
            .field("native_texture_types", &self.native_texture_type_names())
            .field("registry_sealed", &self.is_registry_sealed())
            .finish()
    }
}

impl Engine {
    /// Creates an engine with the default configuration that logs warnings.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config: RwLock::new(config),
            warnings: RwLock::new(Arc::new(LogWarningManager)),
            registry: RwLock::new(Vec::new()),
            registry_sealed: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Replaces the configuration.
    pub fn set_config(&self, config: EngineConfig) {
        *self.config.write() = config;
    }

    /// Modifies the configuration in place.
    pub fn update_config(&self, update: impl FnOnce(&mut EngineConfig)) {
        update(&mut self.config.write());
    }

    /// Version assigned to newly constructed native textures.
    pub fn version(&self) -> LibraryVersion {
        self.config.read().version
    }

    /// Installs a new warning dispatcher.
    pub fn set_warning_manager(&self, manager: Arc<dyn WarningManager>) {
        *self.warnings.write() = manager;
    }

    /// Whether a warning of `level` would be dispatched.
    pub fn is_warning_enabled(&self, level: u32) -> bool {
        let config = self.config.read();
        level <= config.warning_level && !(config.ignore_secure_warnings && level >= 2)
    }

    /// Dispatches a warning if its level passes the configured gate.
    pub fn push_warning(&self, level: u32, message: impl AsRef<str>) {
        if !self.is_warning_enabled(level) {
            return;
        }
        let manager = Arc::clone(&self.warnings.read());
        manager.on_warning(level, message.as_ref());
    }

    /// Allocates a zeroed pixel buffer.
    ///
    /// # Errors
    ///
    /// [`TxdError::AllocationFailure`] when `size` exceeds
    /// [`EngineConfig::max_pixel_allocation`] or the system allocator fails.
    pub fn allocate_pixels(&self, size: usize) -> TxdResult<Vec<u8>> {
        if size > self.config.read().max_pixel_allocation {
            return Err(TxdError::AllocationFailure(size));
        }
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| TxdError::AllocationFailure(size))?;
        buffer.resize(size, 0);
        Ok(buffer)
    }

    /// Registers a native texture type under its unique name.
    ///
    /// # Errors
    ///
    /// - [`TxdError::RegistrySealed`] after the first serialization
    /// - [`TxdError::TypeAlreadyRegistered`] when the name is taken
    pub fn register_native_texture_type(
        &self,
        native_type: Arc<dyn NativeTextureType>,
    ) -> TxdResult<()> {
        let mut registry = self.registry.write();
        if self.is_registry_sealed() {
            return Err(TxdError::RegistrySealed);
        }
        let name = native_type.name();
        if registry.iter().any(|existing| existing.name() == name) {
            return Err(TxdError::TypeAlreadyRegistered(name.into()));
        }
        log::debug!(target: "rwtxd", "registered native texture type '{name}'");
        registry.push(native_type);
        Ok(())
    }

    /// Looks up a type by name.
    pub fn native_texture_type(&self, name: &str) -> Option<Arc<dyn NativeTextureType>> {
        self.registry
            .read()
            .iter()
            .find(|native_type| native_type.name() == name)
            .cloned()
    }

    /// Looks up the first registered type that reads the given platform descriptor.
    pub fn native_texture_type_for_platform(
        &self,
        platform: u32,
    ) -> Option<Arc<dyn NativeTextureType>> {
        self.registry
            .read()
            .iter()
            .find(|native_type| native_type.accepts_platform(platform))
            .cloned()
    }

    /// Names of all registered types, in registration order.
    pub fn native_texture_type_names(&self) -> Vec<&'static str> {
        self.registry
            .read()
            .iter()
            .map(|native_type| native_type.name())
            .collect()
    }

    /// Forbids further type registration.
    pub fn seal_registry(&self) {
        if !self.registry_sealed.swap(true, Ordering::AcqRel) {
            log::debug!(target: "rwtxd", "native texture type registry sealed");
        }
    }

    /// Whether [`Engine::seal_registry`] was called.
    pub fn is_registry_sealed(&self) -> bool {
        self.registry_sealed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_prelude::*;

    #[rstest]
    #[case(3, false, &[1, 2, 3])]
    #[case(1, false, &[1])]
    #[case(0, false, &[])]
    #[case(3, true, &[1])]
    fn warnings_are_level_gated(
        #[case] warning_level: u32,
        #[case] ignore_secure: bool,
        #[case] dispatched: &[u32],
    ) {
        let (engine, warnings) = recording_engine(
            EngineConfig::default()
                .with_warning_level(warning_level)
                .with_ignore_secure_warnings(ignore_secure),
        );
        for level in 1..=4 {
            engine.push_warning(level, format!("level {level}"));
        }
        let expected: Vec<String> = dispatched.iter().map(|level| format!("level {level}")).collect();
        assert_eq!(warnings.warnings(), expected);
    }

    #[test]
    fn allocation_respects_ceiling() {
        let engine = Engine::with_config(EngineConfig::default().with_max_pixel_allocation(16));
        assert_eq!(engine.allocate_pixels(16).unwrap(), vec![0u8; 16]);
        assert!(matches!(
            engine.allocate_pixels(17),
            Err(TxdError::AllocationFailure(17))
        ));
    }

    #[test]
    fn registry_rejects_duplicates_and_late_registration() {
        let engine = Engine::new();
        engine
            .register_native_texture_type(Arc::new(DummyType("dummy")))
            .unwrap();
        assert!(matches!(
            engine.register_native_texture_type(Arc::new(DummyType("dummy"))),
            Err(TxdError::TypeAlreadyRegistered(name)) if name == "dummy"
        ));
        assert!(engine.native_texture_type("dummy").is_some());
        assert!(engine.native_texture_type_for_platform(DUMMY_PLATFORM).is_some());
        assert!(engine.native_texture_type_for_platform(0).is_none());

        engine.seal_registry();
        assert!(matches!(
            engine.register_native_texture_type(Arc::new(DummyType("other"))),
            Err(TxdError::RegistrySealed)
        ));
        assert_eq!(engine.native_texture_type_names(), vec!["dummy"]);
    }
}
