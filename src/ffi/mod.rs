//! Raw NVML ABI surface
//!
//! Mirrors the subset of the NVML C API this crate forwards to: return
//! codes, fixed buffer sizes, `#[repr(C)]` argument structs, and the
//! function-pointer signatures resolved from the shared library at load
//! time. Nothing here calls NVML; [`library::LibNvml`] does.

pub mod library;

pub use library::{LibNvml, SystemLoader};

use std::os::raw::{c_char, c_longlong, c_uint, c_ulong, c_ulonglong, c_void};

/// NVML result code (`nvmlReturn_t`).
pub type RawResult = c_uint;

/// Opaque device handle (`nvmlDevice_t`).
pub type RawDevice = *mut c_void;

pub const NVML_SUCCESS: RawResult = 0;
pub const NVML_ERROR_UNINITIALIZED: RawResult = 1;
pub const NVML_ERROR_INVALID_ARGUMENT: RawResult = 2;
pub const NVML_ERROR_NOT_SUPPORTED: RawResult = 3;
pub const NVML_ERROR_NO_PERMISSION: RawResult = 4;
pub const NVML_ERROR_ALREADY_INITIALIZED: RawResult = 5;
pub const NVML_ERROR_NOT_FOUND: RawResult = 6;
pub const NVML_ERROR_INSUFFICIENT_SIZE: RawResult = 7;
pub const NVML_ERROR_INSUFFICIENT_POWER: RawResult = 8;
pub const NVML_ERROR_DRIVER_NOT_LOADED: RawResult = 9;
pub const NVML_ERROR_TIMEOUT: RawResult = 10;
pub const NVML_ERROR_IRQ_ISSUE: RawResult = 11;
pub const NVML_ERROR_LIBRARY_NOT_FOUND: RawResult = 12;
pub const NVML_ERROR_FUNCTION_NOT_FOUND: RawResult = 13;
pub const NVML_ERROR_CORRUPTED_INFOROM: RawResult = 14;
pub const NVML_ERROR_GPU_IS_LOST: RawResult = 15;
pub const NVML_ERROR_UNKNOWN: RawResult = 999;

/// `NVML_SYSTEM_DRIVER_VERSION_BUFFER_SIZE`
pub const SYSTEM_DRIVER_VERSION_BUFFER_SIZE: usize = 80;
/// `NVML_SYSTEM_NVML_VERSION_BUFFER_SIZE`
pub const SYSTEM_NVML_VERSION_BUFFER_SIZE: usize = 80;
/// `NVML_DEVICE_NAME_BUFFER_SIZE`
pub const DEVICE_NAME_BUFFER_SIZE: usize = 64;
/// `NVML_DEVICE_UUID_BUFFER_SIZE`
pub const DEVICE_UUID_BUFFER_SIZE: usize = 80;

/// `NVML_TEMPERATURE_GPU`, the only sensor the on-die query supports.
pub const TEMPERATURE_GPU: c_uint = 0;

/// `nvmlMemory_t`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawMemory {
    pub total: c_ulonglong,
    pub free: c_ulonglong,
    pub used: c_ulonglong,
}

/// `nvmlUtilization_t`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawUtilization {
    pub gpu: c_uint,
    pub memory: c_uint,
}

/// `nvmlValue_t`, tagged externally by `nvmlValueType_t`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union RawSampleValue {
    pub d: f64,
    pub ui: c_uint,
    pub ul: c_ulong,
    pub ull: c_ulonglong,
    pub sll: c_longlong,
}

/// `nvmlSample_t`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSample {
    /// CPU timestamp in microseconds.
    pub timestamp: c_ulonglong,
    pub value: RawSampleValue,
}

impl RawSample {
    pub(crate) fn zeroed() -> Self {
        Self {
            timestamp: 0,
            value: RawSampleValue { ull: 0 },
        }
    }
}

/// `nvmlProcessUtilizationSample_t`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawProcessSample {
    pub pid: c_uint,
    pub timestamp: c_ulonglong,
    pub sm_util: c_uint,
    pub mem_util: c_uint,
    pub enc_util: c_uint,
    pub dec_util: c_uint,
}

impl RawProcessSample {
    pub(crate) fn zeroed() -> Self {
        Self {
            pid: 0,
            timestamp: 0,
            sm_util: 0,
            mem_util: 0,
            enc_util: 0,
            dec_util: 0,
        }
    }
}

/// `nvmlAccountingStats_t`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawAccountingStats {
    pub gpu_utilization: c_uint,
    pub memory_utilization: c_uint,
    pub max_memory_usage: c_ulonglong,
    /// Active compute-context time in milliseconds.
    pub time: c_ulonglong,
    /// Process start time, CPU timestamp in microseconds.
    pub start_time: c_ulonglong,
    pub is_running: c_uint,
    pub reserved: [c_uint; 5],
}

pub(crate) type InitFn = unsafe extern "C" fn() -> RawResult;
pub(crate) type ShutdownFn = unsafe extern "C" fn() -> RawResult;
pub(crate) type SystemGetVersionFn = unsafe extern "C" fn(*mut c_char, c_uint) -> RawResult;
pub(crate) type SystemGetProcessNameFn =
    unsafe extern "C" fn(c_uint, *mut c_char, c_uint) -> RawResult;
pub(crate) type DeviceGetCountFn = unsafe extern "C" fn(*mut c_uint) -> RawResult;
pub(crate) type DeviceGetHandleByIndexFn =
    unsafe extern "C" fn(c_uint, *mut RawDevice) -> RawResult;
pub(crate) type DeviceGetUintFn = unsafe extern "C" fn(RawDevice, *mut c_uint) -> RawResult;
pub(crate) type DeviceGetStringFn =
    unsafe extern "C" fn(RawDevice, *mut c_char, c_uint) -> RawResult;
pub(crate) type DeviceGetMemoryInfoFn =
    unsafe extern "C" fn(RawDevice, *mut RawMemory) -> RawResult;
pub(crate) type DeviceGetUtilizationRatesFn =
    unsafe extern "C" fn(RawDevice, *mut RawUtilization) -> RawResult;
pub(crate) type DeviceGetTemperatureFn =
    unsafe extern "C" fn(RawDevice, c_uint, *mut c_uint) -> RawResult;
pub(crate) type DeviceGetCodecUtilizationFn =
    unsafe extern "C" fn(RawDevice, *mut c_uint, *mut c_uint) -> RawResult;
pub(crate) type DeviceGetSamplesFn = unsafe extern "C" fn(
    RawDevice,
    c_uint,
    c_ulonglong,
    *mut c_uint,
    *mut c_uint,
    *mut RawSample,
) -> RawResult;
pub(crate) type DeviceGetAccountingStatsFn =
    unsafe extern "C" fn(RawDevice, c_uint, *mut RawAccountingStats) -> RawResult;
pub(crate) type DeviceGetAccountingPidsFn =
    unsafe extern "C" fn(RawDevice, *mut c_uint, *mut c_uint) -> RawResult;
pub(crate) type DeviceGetProcessUtilizationFn = unsafe extern "C" fn(
    RawDevice,
    *mut RawProcessSample,
    *mut c_uint,
    c_ulonglong,
) -> RawResult;

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    // Layout assertions against the documented nvml.h struct definitions.

    #[test]
    fn test_memory_layout() {
        assert_eq!(size_of::<RawMemory>(), 24);
    }

    #[test]
    fn test_utilization_layout() {
        assert_eq!(size_of::<RawUtilization>(), 8);
    }

    #[test]
    fn test_sample_layout() {
        assert_eq!(size_of::<RawSampleValue>(), 8);
        assert_eq!(size_of::<RawSample>(), 16);
    }

    #[test]
    fn test_process_sample_layout() {
        assert_eq!(size_of::<RawProcessSample>(), 32);
    }

    #[test]
    fn test_accounting_stats_layout() {
        assert_eq!(size_of::<RawAccountingStats>(), 56);
    }
}
