//! Dynamically loaded NVML library
//!
//! Loads `libnvidia-ml.so.1` through the platform dynamic linker at run
//! time and resolves every entry point this crate forwards to. Keeping the
//! load out of link time means binaries start (and fail politely) on hosts
//! without the NVIDIA driver installed.

use crate::domain::{AccountingStats, CodecUtilization, MemoryInfo, ProcessSample, SamplingKind, Utilization};
use crate::error::NvmlError;
use crate::ffi::{self, RawDevice};
use crate::nvml::traits::{NvmlApi, NvmlLoader};

use libloading::Library;

use std::os::raw::{c_char, c_uint};
use std::ptr;

#[cfg(unix)]
const LIBRARY_NAMES: &[&str] = &["libnvidia-ml.so.1", "libnvidia-ml.so"];

#[cfg(not(unix))]
const LIBRARY_NAMES: &[&str] = &["nvml.dll"];

// NVML has no documented bound on process names; matches what nvidia-smi uses.
const PROCESS_NAME_BUFFER_SIZE: usize = 256;

/// The real NVML library, loaded at run time with every required symbol
/// resolved eagerly. A missing symbol fails the load as a whole, so a
/// constructed `LibNvml` can always reach each entry point.
pub struct LibNvml {
    init: ffi::InitFn,
    shutdown: ffi::ShutdownFn,
    system_get_driver_version: ffi::SystemGetVersionFn,
    system_get_nvml_version: ffi::SystemGetVersionFn,
    system_get_process_name: ffi::SystemGetProcessNameFn,
    device_get_count: ffi::DeviceGetCountFn,
    device_get_handle_by_index: ffi::DeviceGetHandleByIndexFn,
    device_get_minor_number: ffi::DeviceGetUintFn,
    device_get_uuid: ffi::DeviceGetStringFn,
    device_get_name: ffi::DeviceGetStringFn,
    device_get_memory_info: ffi::DeviceGetMemoryInfoFn,
    device_get_utilization_rates: ffi::DeviceGetUtilizationRatesFn,
    device_get_power_usage: ffi::DeviceGetUintFn,
    device_get_temperature: ffi::DeviceGetTemperatureFn,
    device_get_fan_speed: ffi::DeviceGetUintFn,
    device_get_encoder_utilization: ffi::DeviceGetCodecUtilizationFn,
    device_get_decoder_utilization: ffi::DeviceGetCodecUtilizationFn,
    device_get_samples: ffi::DeviceGetSamplesFn,
    device_get_accounting_mode: ffi::DeviceGetUintFn,
    device_get_accounting_stats: ffi::DeviceGetAccountingStatsFn,
    device_get_accounting_pids: ffi::DeviceGetAccountingPidsFn,
    device_get_accounting_buffer_size: ffi::DeviceGetUintFn,
    device_get_process_utilization: ffi::DeviceGetProcessUtilizationFn,
    lib: Library,
}

impl LibNvml {
    /// Load the NVML shared library and resolve all entry points.
    ///
    /// Returns [`NvmlError::LibraryNotFound`] when no candidate library
    /// can be loaded and [`NvmlError::FunctionNotFound`] when one loads
    /// but is missing a required symbol.
    pub fn open() -> Result<Self, NvmlError> {
        let lib = open_library()?;

        unsafe {
            Ok(Self {
                init: load_fn(&lib, b"nvmlInit_v2\0")?,
                shutdown: load_fn(&lib, b"nvmlShutdown\0")?,
                system_get_driver_version: load_fn(&lib, b"nvmlSystemGetDriverVersion\0")?,
                system_get_nvml_version: load_fn(&lib, b"nvmlSystemGetNVMLVersion\0")?,
                system_get_process_name: load_fn(&lib, b"nvmlSystemGetProcessName\0")?,
                device_get_count: load_fn(&lib, b"nvmlDeviceGetCount_v2\0")?,
                device_get_handle_by_index: load_fn(&lib, b"nvmlDeviceGetHandleByIndex_v2\0")?,
                device_get_minor_number: load_fn(&lib, b"nvmlDeviceGetMinorNumber\0")?,
                device_get_uuid: load_fn(&lib, b"nvmlDeviceGetUUID\0")?,
                device_get_name: load_fn(&lib, b"nvmlDeviceGetName\0")?,
                device_get_memory_info: load_fn(&lib, b"nvmlDeviceGetMemoryInfo\0")?,
                device_get_utilization_rates: load_fn(&lib, b"nvmlDeviceGetUtilizationRates\0")?,
                device_get_power_usage: load_fn(&lib, b"nvmlDeviceGetPowerUsage\0")?,
                device_get_temperature: load_fn(&lib, b"nvmlDeviceGetTemperature\0")?,
                device_get_fan_speed: load_fn(&lib, b"nvmlDeviceGetFanSpeed\0")?,
                device_get_encoder_utilization: load_fn(&lib, b"nvmlDeviceGetEncoderUtilization\0")?,
                device_get_decoder_utilization: load_fn(&lib, b"nvmlDeviceGetDecoderUtilization\0")?,
                device_get_samples: load_fn(&lib, b"nvmlDeviceGetSamples\0")?,
                device_get_accounting_mode: load_fn(&lib, b"nvmlDeviceGetAccountingMode\0")?,
                device_get_accounting_stats: load_fn(&lib, b"nvmlDeviceGetAccountingStats\0")?,
                device_get_accounting_pids: load_fn(&lib, b"nvmlDeviceGetAccountingPids\0")?,
                device_get_accounting_buffer_size: load_fn(
                    &lib,
                    b"nvmlDeviceGetAccountingBufferSize\0",
                )?,
                device_get_process_utilization: load_fn(&lib, b"nvmlDeviceGetProcessUtilization\0")?,
                lib,
            })
        }
    }
}

/// Open the first loadable candidate library.
///
/// On Unix the library is opened with lazy binding and global symbol
/// visibility, so NVML's symbols are available to anything loaded into the
/// process later that expects them.
fn open_library() -> Result<Library, NvmlError> {
    for name in LIBRARY_NAMES {
        match open_one(name) {
            Ok(lib) => {
                log::debug!("loaded NVML from {name}");
                return Ok(lib);
            }
            Err(err) => log::debug!("failed to load {name}: {err}"),
        }
    }
    Err(NvmlError::LibraryNotFound)
}

#[cfg(unix)]
fn open_one(name: &str) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_LAZY};

    unsafe { UnixLibrary::open(Some(name), RTLD_LAZY | RTLD_GLOBAL).map(Into::into) }
}

#[cfg(not(unix))]
fn open_one(name: &str) -> Result<Library, libloading::Error> {
    unsafe { Library::new(name) }
}

unsafe fn load_fn<F: Copy>(lib: &Library, name: &[u8]) -> Result<F, NvmlError> {
    match lib.get::<F>(name) {
        Ok(sym) => Ok(*sym),
        Err(err) => {
            log::debug!(
                "missing NVML symbol {}: {err}",
                String::from_utf8_lossy(&name[..name.len() - 1])
            );
            Err(NvmlError::FunctionNotFound)
        }
    }
}

/// Decode a NUL-terminated C buffer into an owned string.
fn decode_buf(buf: &[c_char]) -> String {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

impl NvmlApi for LibNvml {
    fn init(&self) -> Result<(), NvmlError> {
        NvmlError::check(unsafe { (self.init)() })
    }

    fn shutdown(&self) -> Result<(), NvmlError> {
        NvmlError::check(unsafe { (self.shutdown)() })
    }

    fn driver_version(&self) -> Result<String, NvmlError> {
        let mut buf = [0 as c_char; ffi::SYSTEM_DRIVER_VERSION_BUFFER_SIZE];
        NvmlError::check(unsafe {
            (self.system_get_driver_version)(buf.as_mut_ptr(), buf.len() as c_uint)
        })?;
        Ok(decode_buf(&buf))
    }

    fn nvml_version(&self) -> Result<String, NvmlError> {
        let mut buf = [0 as c_char; ffi::SYSTEM_NVML_VERSION_BUFFER_SIZE];
        NvmlError::check(unsafe {
            (self.system_get_nvml_version)(buf.as_mut_ptr(), buf.len() as c_uint)
        })?;
        Ok(decode_buf(&buf))
    }

    fn process_name(&self, pid: u32) -> Result<String, NvmlError> {
        let mut buf = [0 as c_char; PROCESS_NAME_BUFFER_SIZE];
        NvmlError::check(unsafe {
            (self.system_get_process_name)(pid, buf.as_mut_ptr(), buf.len() as c_uint)
        })?;
        Ok(decode_buf(&buf))
    }

    fn device_count(&self) -> Result<u32, NvmlError> {
        let mut count: c_uint = 0;
        NvmlError::check(unsafe { (self.device_get_count)(&mut count) })?;
        Ok(count)
    }

    fn device_handle_by_index(&self, index: u32) -> Result<RawDevice, NvmlError> {
        let mut device: RawDevice = ptr::null_mut();
        NvmlError::check(unsafe { (self.device_get_handle_by_index)(index, &mut device) })?;
        Ok(device)
    }

    fn device_minor_number(&self, device: RawDevice) -> Result<u32, NvmlError> {
        let mut minor: c_uint = 0;
        NvmlError::check(unsafe { (self.device_get_minor_number)(device, &mut minor) })?;
        Ok(minor)
    }

    fn device_uuid(&self, device: RawDevice) -> Result<String, NvmlError> {
        let mut buf = [0 as c_char; ffi::DEVICE_UUID_BUFFER_SIZE];
        NvmlError::check(unsafe {
            (self.device_get_uuid)(device, buf.as_mut_ptr(), buf.len() as c_uint)
        })?;
        Ok(decode_buf(&buf))
    }

    fn device_name(&self, device: RawDevice) -> Result<String, NvmlError> {
        let mut buf = [0 as c_char; ffi::DEVICE_NAME_BUFFER_SIZE];
        NvmlError::check(unsafe {
            (self.device_get_name)(device, buf.as_mut_ptr(), buf.len() as c_uint)
        })?;
        Ok(decode_buf(&buf))
    }

    fn device_memory_info(&self, device: RawDevice) -> Result<MemoryInfo, NvmlError> {
        let mut memory = ffi::RawMemory {
            total: 0,
            free: 0,
            used: 0,
        };
        NvmlError::check(unsafe { (self.device_get_memory_info)(device, &mut memory) })?;
        Ok(MemoryInfo {
            total: memory.total,
            free: memory.free,
            used: memory.used,
        })
    }

    fn device_utilization_rates(&self, device: RawDevice) -> Result<Utilization, NvmlError> {
        let mut util = ffi::RawUtilization { gpu: 0, memory: 0 };
        NvmlError::check(unsafe { (self.device_get_utilization_rates)(device, &mut util) })?;
        Ok(Utilization {
            gpu: util.gpu,
            memory: util.memory,
        })
    }

    fn device_power_usage(&self, device: RawDevice) -> Result<u32, NvmlError> {
        let mut milliwatts: c_uint = 0;
        NvmlError::check(unsafe { (self.device_get_power_usage)(device, &mut milliwatts) })?;
        Ok(milliwatts)
    }

    fn device_temperature(&self, device: RawDevice) -> Result<u32, NvmlError> {
        let mut celsius: c_uint = 0;
        NvmlError::check(unsafe {
            (self.device_get_temperature)(device, ffi::TEMPERATURE_GPU, &mut celsius)
        })?;
        Ok(celsius)
    }

    fn device_fan_speed(&self, device: RawDevice) -> Result<u32, NvmlError> {
        let mut percent: c_uint = 0;
        NvmlError::check(unsafe { (self.device_get_fan_speed)(device, &mut percent) })?;
        Ok(percent)
    }

    fn device_encoder_utilization(&self, device: RawDevice) -> Result<CodecUtilization, NvmlError> {
        let mut utilization: c_uint = 0;
        let mut period: c_uint = 0;
        NvmlError::check(unsafe {
            (self.device_get_encoder_utilization)(device, &mut utilization, &mut period)
        })?;
        Ok(CodecUtilization {
            utilization,
            sampling_period_us: period,
        })
    }

    fn device_decoder_utilization(&self, device: RawDevice) -> Result<CodecUtilization, NvmlError> {
        let mut utilization: c_uint = 0;
        let mut period: c_uint = 0;
        NvmlError::check(unsafe {
            (self.device_get_decoder_utilization)(device, &mut utilization, &mut period)
        })?;
        Ok(CodecUtilization {
            utilization,
            sampling_period_us: period,
        })
    }

    fn device_samples(
        &self,
        device: RawDevice,
        kind: SamplingKind,
        last_seen_us: u64,
    ) -> Result<Vec<u32>, NvmlError> {
        let mut value_type: c_uint = 0;
        let mut count: c_uint = 0;

        // First call with a null buffer only reports how many samples the
        // driver's circular buffer can return.
        NvmlError::check(unsafe {
            (self.device_get_samples)(
                device,
                kind.as_raw(),
                last_seen_us,
                &mut value_type,
                &mut count,
                ptr::null_mut(),
            )
        })?;

        if count == 0 {
            return Ok(Vec::new());
        }

        let mut samples = vec![ffi::RawSample::zeroed(); count as usize];
        NvmlError::check(unsafe {
            (self.device_get_samples)(
                device,
                kind.as_raw(),
                last_seen_us,
                &mut value_type,
                &mut count,
                samples.as_mut_ptr(),
            )
        })?;
        samples.truncate(count as usize);

        // Both supported sampling kinds report unsigned-int values.
        Ok(samples.iter().map(|s| unsafe { s.value.ui }).collect())
    }

    fn device_accounting_mode(&self, device: RawDevice) -> Result<bool, NvmlError> {
        let mut mode: c_uint = 0;
        NvmlError::check(unsafe { (self.device_get_accounting_mode)(device, &mut mode) })?;
        Ok(mode == 1)
    }

    fn device_accounting_stats(
        &self,
        device: RawDevice,
        pid: u32,
    ) -> Result<AccountingStats, NvmlError> {
        let mut stats = ffi::RawAccountingStats {
            gpu_utilization: 0,
            memory_utilization: 0,
            max_memory_usage: 0,
            time: 0,
            start_time: 0,
            is_running: 0,
            reserved: [0; 5],
        };
        NvmlError::check(unsafe {
            (self.device_get_accounting_stats)(device, pid, &mut stats)
        })?;
        Ok(AccountingStats {
            gpu_utilization: stats.gpu_utilization,
            memory_utilization: stats.memory_utilization,
            max_memory_usage: stats.max_memory_usage,
            time_ms: stats.time,
            start_time_us: stats.start_time,
            is_running: stats.is_running == 1,
        })
    }

    fn device_accounting_pids(&self, device: RawDevice) -> Result<Vec<u32>, NvmlError> {
        // The driver's accounting buffer size bounds how many PIDs can come
        // back, so it doubles as the allocation size.
        let capacity = self.device_accounting_buffer_size(device)?;
        if capacity == 0 {
            return Ok(Vec::new());
        }

        let mut pids = vec![0 as c_uint; capacity as usize];
        let mut count: c_uint = capacity;
        NvmlError::check(unsafe {
            (self.device_get_accounting_pids)(device, &mut count, pids.as_mut_ptr())
        })?;
        pids.truncate(count as usize);
        Ok(pids)
    }

    fn device_accounting_buffer_size(&self, device: RawDevice) -> Result<u32, NvmlError> {
        let mut size: c_uint = 0;
        NvmlError::check(unsafe {
            (self.device_get_accounting_buffer_size)(device, &mut size)
        })?;
        Ok(size)
    }

    fn device_process_utilization(
        &self,
        device: RawDevice,
        last_seen_us: u64,
    ) -> Result<Vec<ProcessSample>, NvmlError> {
        let mut count: c_uint = 0;

        // Null-buffer call sizes the allocation; the driver reports the
        // required count through InsufficientSize as well as Success.
        let first = unsafe {
            (self.device_get_process_utilization)(device, ptr::null_mut(), &mut count, last_seen_us)
        };
        match NvmlError::check(first) {
            Ok(()) | Err(NvmlError::InsufficientSize) => {}
            Err(err) => return Err(err),
        }

        if count == 0 {
            return Ok(Vec::new());
        }

        let mut samples = vec![ffi::RawProcessSample::zeroed(); count as usize];
        NvmlError::check(unsafe {
            (self.device_get_process_utilization)(
                device,
                samples.as_mut_ptr(),
                &mut count,
                last_seen_us,
            )
        })?;
        samples.truncate(count as usize);

        Ok(samples
            .iter()
            .map(|s| ProcessSample {
                pid: s.pid,
                timestamp_us: s.timestamp,
                sm_util: s.sm_util,
                mem_util: s.mem_util,
                enc_util: s.enc_util,
                dec_util: s.dec_util,
            })
            .collect())
    }

    fn unload(self: Box<Self>) -> Result<(), NvmlError> {
        let Self { lib, .. } = *self;
        lib.close().map_err(|err| {
            log::warn!("failed to unload NVML library: {err}");
            NvmlError::Unknown
        })
    }
}

/// Loads the real NVML library via the platform dynamic linker.
///
/// This is the loader [`crate::nvml::Nvml::new`] installs; tests substitute
/// their own [`NvmlLoader`] instead.
#[derive(Debug, Default)]
pub struct SystemLoader;

impl NvmlLoader for SystemLoader {
    fn load(&self) -> Result<Box<dyn NvmlApi>, NvmlError> {
        LibNvml::open().map(|lib| Box::new(lib) as Box<dyn NvmlApi>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_buf_stops_at_nul() {
        let buf: Vec<c_char> = b"535.154.05\0garbage"
            .iter()
            .map(|&b| b as c_char)
            .collect();
        assert_eq!(decode_buf(&buf), "535.154.05");
    }

    #[test]
    fn test_decode_buf_without_nul() {
        let buf: Vec<c_char> = b"abc".iter().map(|&b| b as c_char).collect();
        assert_eq!(decode_buf(&buf), "abc");
    }

    #[test]
    #[ignore = "Requires NVIDIA driver"]
    fn test_open_real_library() {
        let lib = LibNvml::open();
        assert!(lib.is_ok());
    }
}
