//! Trait definitions for the loaded-library boundary
//!
//! These traits abstract over the platform loader and the loaded NVML
//! library so tests can substitute scripted fakes for both.

use crate::domain::{AccountingStats, CodecUtilization, MemoryInfo, ProcessSample, SamplingKind, Utilization};
use crate::error::NvmlError;
use crate::ffi::RawDevice;

/// The entry-point surface of a loaded NVML library.
///
/// One implementation wraps the real shared library
/// ([`crate::ffi::LibNvml`]); mocks implement the same contract in-process.
/// Every method is a single forwarded call; results come back exactly as
/// the library reported them, mapped 1:1 into [`NvmlError`].
pub trait NvmlApi: Send + Sync {
    /// Invoke the library's own initialization entry point.
    fn init(&self) -> Result<(), NvmlError>;

    /// Invoke the library's own shutdown entry point.
    fn shutdown(&self) -> Result<(), NvmlError>;

    /// Installed driver version string.
    fn driver_version(&self) -> Result<String, NvmlError>;

    /// NVML library version string.
    fn nvml_version(&self) -> Result<String, NvmlError>;

    /// Name of the process with the given PID, as the driver knows it.
    fn process_name(&self, pid: u32) -> Result<String, NvmlError>;

    /// Number of devices in the system.
    fn device_count(&self) -> Result<u32, NvmlError>;

    /// Opaque handle for the device at `index` (0-based; enumeration order
    /// is not stable across reboots).
    fn device_handle_by_index(&self, index: u32) -> Result<RawDevice, NvmlError>;

    /// Minor number, i.e. the N in `/dev/nvidiaN`.
    fn device_minor_number(&self, device: RawDevice) -> Result<u32, NvmlError>;

    /// Globally unique immutable device UUID.
    fn device_uuid(&self, device: RawDevice) -> Result<String, NvmlError>;

    /// Product name.
    fn device_name(&self, device: RawDevice) -> Result<String, NvmlError>;

    /// Framebuffer memory usage.
    fn device_memory_info(&self, device: RawDevice) -> Result<MemoryInfo, NvmlError>;

    /// GPU and memory utilization over the last sample period.
    fn device_utilization_rates(&self, device: RawDevice) -> Result<Utilization, NvmlError>;

    /// Current power draw in milliwatts.
    fn device_power_usage(&self, device: RawDevice) -> Result<u32, NvmlError>;

    /// Core temperature in degrees Celsius.
    fn device_temperature(&self, device: RawDevice) -> Result<u32, NvmlError>;

    /// Fan speed as a percent of its maximum.
    fn device_fan_speed(&self, device: RawDevice) -> Result<u32, NvmlError>;

    /// Video encoder utilization.
    fn device_encoder_utilization(&self, device: RawDevice)
        -> Result<CodecUtilization, NvmlError>;

    /// Video decoder utilization.
    fn device_decoder_utilization(&self, device: RawDevice)
        -> Result<CodecUtilization, NvmlError>;

    /// Drain the device's internal sample buffer for `kind`, returning the
    /// sample values newer than `last_seen_us` (unix epoch, microseconds).
    fn device_samples(
        &self,
        device: RawDevice,
        kind: SamplingKind,
        last_seen_us: u64,
    ) -> Result<Vec<u32>, NvmlError>;

    /// Whether per-process accounting is enabled on the device.
    fn device_accounting_mode(&self, device: RawDevice) -> Result<bool, NvmlError>;

    /// Accounting statistics for one process.
    fn device_accounting_stats(
        &self,
        device: RawDevice,
        pid: u32,
    ) -> Result<AccountingStats, NvmlError>;

    /// PIDs with accounting statistics available.
    fn device_accounting_pids(&self, device: RawDevice) -> Result<Vec<u32>, NvmlError>;

    /// Capacity of the driver's circular accounting buffer.
    fn device_accounting_buffer_size(&self, device: RawDevice) -> Result<u32, NvmlError>;

    /// Per-process utilization samples newer than `last_seen_us`.
    fn device_process_utilization(
        &self,
        device: RawDevice,
        last_seen_us: u64,
    ) -> Result<Vec<ProcessSample>, NvmlError>;

    /// Release the loaded library image.
    ///
    /// Consumes the handle; only called by [`crate::nvml::Nvml::shutdown`]
    /// after the library's own shutdown reported success.
    fn unload(self: Box<Self>) -> Result<(), NvmlError>;
}

/// Produces a loaded library.
///
/// [`crate::ffi::SystemLoader`] goes through the platform dynamic linker;
/// test loaders hand out mocks or fail on cue.
pub trait NvmlLoader: Send + Sync {
    /// Locate and load the library, resolving its entry points.
    fn load(&self) -> Result<Box<dyn NvmlApi>, NvmlError>;
}
