//! NVML lifecycle owner
//!
//! [`Nvml`] holds the one handle to the dynamically loaded library and
//! mediates every call through it. The handle has two states, absent and
//! present; only [`Nvml::init`] sets it and only [`Nvml::shutdown`]
//! clears it.

use crate::error::NvmlError;
use crate::ffi::SystemLoader;
use crate::nvml::device::Device;
use crate::nvml::traits::{NvmlApi, NvmlLoader};

/// Owner of the loaded NVML library.
///
/// Construct once, call [`init`](Self::init), query, then call
/// [`shutdown`](Self::shutdown), all from one controlling thread. The
/// `&mut self` receivers on init/shutdown let the borrow checker enforce
/// that a single controller serializes the lifecycle; queries take `&self`
/// and forward to the loaded library.
///
/// Dropping an initialized `Nvml` releases the library image without
/// invoking the library's own shutdown; call [`shutdown`](Self::shutdown)
/// for an orderly teardown.
pub struct Nvml {
    loader: Box<dyn NvmlLoader>,
    lib: Option<Box<dyn NvmlApi>>,
}

impl Nvml {
    /// New instance backed by the platform dynamic linker.
    ///
    /// Nothing is loaded until [`init`](Self::init) is called.
    pub fn new() -> Self {
        Self::with_loader(Box::new(SystemLoader))
    }

    /// New instance with a custom loader, e.g. a test double.
    pub fn with_loader(loader: Box<dyn NvmlLoader>) -> Self {
        Self { loader, lib: None }
    }

    /// Load the NVML shared library and initialize it.
    ///
    /// On a load failure the handle stays absent and the error is
    /// [`NvmlError::LibraryNotFound`] (or
    /// [`NvmlError::FunctionNotFound`] for a missing symbol). On a
    /// successful load the handle is stored and the library's own init
    /// result is returned unchanged; even when that result is an error,
    /// the library stays loaded.
    pub fn init(&mut self) -> Result<(), NvmlError> {
        if let Some(lib) = self.lib.as_deref() {
            // Already loaded; NVML's init is reference counted, so just
            // delegate again.
            return lib.init();
        }

        let lib = self.loader.load().map_err(|err| {
            log::debug!("NVML load failed: {err}");
            err
        })?;
        let lib = self.lib.insert(lib);
        lib.init()
    }

    /// Shut down NVML and release the library.
    ///
    /// Safe to call at any point: with no library loaded this is a
    /// successful no-op. Otherwise the library's own shutdown runs first;
    /// if it fails, that result is returned and the library stays loaded
    /// so a later retry can shut it down. Only after the library reports a
    /// clean shutdown is the image released; a failed release comes back
    /// as [`NvmlError::Unknown`], and either way the handle is absent
    /// afterwards.
    pub fn shutdown(&mut self) -> Result<(), NvmlError> {
        let Some(lib) = self.lib.take() else {
            return Ok(());
        };

        if let Err(err) = lib.shutdown() {
            self.lib = Some(lib);
            return Err(err);
        }

        lib.unload().map_err(|_| NvmlError::Unknown)
    }

    /// Whether the library is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.lib.is_some()
    }

    fn lib(&self) -> Result<&dyn NvmlApi, NvmlError> {
        self.lib.as_deref().ok_or(NvmlError::Uninitialized)
    }

    /// Installed driver version.
    pub fn driver_version(&self) -> Result<String, NvmlError> {
        self.lib()?.driver_version()
    }

    /// NVML library version.
    pub fn nvml_version(&self) -> Result<String, NvmlError> {
        self.lib()?.nvml_version()
    }

    /// Number of devices in the system.
    pub fn device_count(&self) -> Result<u32, NvmlError> {
        self.lib()?.device_count()
    }

    /// Device at `index` (0 to [`device_count`](Self::device_count) - 1).
    pub fn device_by_index(&self, index: u32) -> Result<Device<'_>, NvmlError> {
        let lib = self.lib()?;
        let raw = lib.device_handle_by_index(index)?;
        Ok(Device::new(lib, raw, index))
    }

    /// Name of the process with the given PID, as the driver knows it.
    pub fn process_name(&self, pid: u32) -> Result<String, NvmlError> {
        self.lib()?.process_name(pid)
    }
}

impl Default for Nvml {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLoader, MockState};

    use std::sync::Arc;

    fn harness() -> (Arc<MockState>, Nvml) {
        let state = Arc::new(MockState::default());
        let nvml = Nvml::with_loader(Box::new(MockLoader::new(Arc::clone(&state))));
        (state, nvml)
    }

    #[test]
    fn test_shutdown_without_init_is_noop() {
        let (state, mut nvml) = harness();

        assert!(nvml.shutdown().is_ok());
        assert_eq!(state.shutdown_calls(), 0);
        assert_eq!(state.unload_calls(), 0);
    }

    #[test]
    fn test_init_load_failure_leaves_handle_absent() {
        let (state, mut nvml) = harness();
        state.fail_load(NvmlError::LibraryNotFound);

        assert_eq!(nvml.init(), Err(NvmlError::LibraryNotFound));
        assert!(!nvml.is_loaded());
        assert_eq!(state.init_calls(), 0);

        // A later shutdown must take the no-op path.
        assert!(nvml.shutdown().is_ok());
        assert_eq!(state.unload_calls(), 0);
    }

    #[test]
    fn test_init_missing_symbol_leaves_handle_absent() {
        let (state, mut nvml) = harness();
        state.fail_load(NvmlError::FunctionNotFound);

        assert_eq!(nvml.init(), Err(NvmlError::FunctionNotFound));
        assert!(!nvml.is_loaded());
    }

    #[test]
    fn test_init_passes_library_result_through() {
        let (state, mut nvml) = harness();
        state.fail_init(NvmlError::DriverNotLoaded);

        let err = nvml.init().unwrap_err();
        assert_eq!(err, NvmlError::DriverNotLoaded);
        assert_eq!(err.raw(), 9);

        // The load itself succeeded, so the library stays loaded.
        assert!(nvml.is_loaded());
        assert_eq!(state.init_calls(), 1);
    }

    #[test]
    fn test_shutdown_failure_keeps_library_loaded() {
        let (state, mut nvml) = harness();
        assert!(nvml.init().is_ok());

        state.fail_shutdown(NvmlError::Timeout);
        assert_eq!(nvml.shutdown(), Err(NvmlError::Timeout));
        assert!(nvml.is_loaded());
        assert_eq!(state.unload_calls(), 0);

        // Queries still reach the library while the handle is live.
        assert!(nvml.device_count().is_ok());

        // A retry after the library recovers completes the teardown.
        state.clear_shutdown_failure();
        assert!(nvml.shutdown().is_ok());
        assert!(!nvml.is_loaded());
        assert_eq!(state.unload_calls(), 1);
    }

    #[test]
    fn test_unload_failure_maps_to_unknown() {
        let (state, mut nvml) = harness();
        assert!(nvml.init().is_ok());

        state.fail_unload(NvmlError::InvalidArgument);
        assert_eq!(nvml.shutdown(), Err(NvmlError::Unknown));
        assert_eq!(state.shutdown_calls(), 1);
        assert_eq!(state.unload_calls(), 1);
    }

    #[test]
    fn test_full_lifecycle() {
        let (state, mut nvml) = harness();

        assert!(nvml.init().is_ok());
        assert!(nvml.is_loaded());
        assert!(nvml.device_count().unwrap() > 0);

        assert!(nvml.shutdown().is_ok());
        assert!(!nvml.is_loaded());
        assert_eq!(state.unload_calls(), 1);

        // Second shutdown hits the absent-handle no-op path.
        assert!(nvml.shutdown().is_ok());
        assert_eq!(state.shutdown_calls(), 1);
        assert_eq!(state.unload_calls(), 1);
    }

    #[test]
    fn test_queries_before_init_fail_uninitialized() {
        let (state, nvml) = harness();

        assert_eq!(nvml.device_count(), Err(NvmlError::Uninitialized));
        assert_eq!(nvml.driver_version(), Err(NvmlError::Uninitialized));
        assert_eq!(state.load_calls(), 0);
    }

    #[test]
    fn test_repeated_init_delegates_without_reloading() {
        let (state, mut nvml) = harness();

        assert!(nvml.init().is_ok());
        assert!(nvml.init().is_ok());
        assert_eq!(state.load_calls(), 1);
        assert_eq!(state.init_calls(), 2);
    }

    #[test]
    fn test_system_queries_forward() {
        let (_state, mut nvml) = harness();
        nvml.init().unwrap();

        assert!(!nvml.driver_version().unwrap().is_empty());
        assert!(!nvml.nvml_version().unwrap().is_empty());
    }
}
