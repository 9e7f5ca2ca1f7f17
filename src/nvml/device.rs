//! Per-device query surface
//!
//! [`Device`] borrows the loaded library from [`crate::nvml::Nvml`] and
//! forwards queries for one GPU. The averaging helpers are the only logic
//! this crate adds on top of the forwarded calls.

use crate::domain::{AccountingStats, CodecUtilization, MemoryInfo, ProcessSample, SamplingKind, Utilization};
use crate::error::NvmlError;
use crate::ffi::RawDevice;
use crate::nvml::traits::NvmlApi;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One GPU, valid as long as the owning [`crate::nvml::Nvml`] stays
/// initialized.
pub struct Device<'a> {
    lib: &'a dyn NvmlApi,
    raw: RawDevice,
    index: u32,
}

impl<'a> std::fmt::Debug for Device<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("raw", &self.raw)
            .field("index", &self.index)
            .finish()
    }
}

impl<'a> Device<'a> {
    pub(crate) fn new(lib: &'a dyn NvmlApi, raw: RawDevice, index: u32) -> Self {
        Self { lib, raw, index }
    }

    /// The index this device was opened with.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Product name.
    pub fn name(&self) -> Result<String, NvmlError> {
        self.lib.device_name(self.raw)
    }

    /// Globally unique immutable UUID.
    pub fn uuid(&self) -> Result<String, NvmlError> {
        self.lib.device_uuid(self.raw)
    }

    /// Minor number, i.e. the N in `/dev/nvidiaN`.
    pub fn minor_number(&self) -> Result<u32, NvmlError> {
        self.lib.device_minor_number(self.raw)
    }

    /// Framebuffer memory usage.
    pub fn memory_info(&self) -> Result<MemoryInfo, NvmlError> {
        self.lib.device_memory_info(self.raw)
    }

    /// GPU and memory utilization over the last sample period.
    pub fn utilization_rates(&self) -> Result<Utilization, NvmlError> {
        self.lib.device_utilization_rates(self.raw)
    }

    /// Current power draw in milliwatts, accurate to within +/- 5%.
    pub fn power_usage(&self) -> Result<u32, NvmlError> {
        self.lib.device_power_usage(self.raw)
    }

    /// Core temperature in degrees Celsius.
    pub fn temperature(&self) -> Result<u32, NvmlError> {
        self.lib.device_temperature(self.raw)
    }

    /// Fan speed as a percent of its maximum.
    pub fn fan_speed(&self) -> Result<u32, NvmlError> {
        self.lib.device_fan_speed(self.raw)
    }

    /// Video encoder utilization.
    pub fn encoder_utilization(&self) -> Result<CodecUtilization, NvmlError> {
        self.lib.device_encoder_utilization(self.raw)
    }

    /// Video decoder utilization.
    pub fn decoder_utilization(&self) -> Result<CodecUtilization, NvmlError> {
        self.lib.device_decoder_utilization(self.raw)
    }

    /// Power draw in milliwatts averaged over the samples the driver
    /// collected in the last `since`.
    pub fn average_power_usage(&self, since: Duration) -> Result<u32, NvmlError> {
        self.average_usage(SamplingKind::TotalPower, since)
    }

    /// GPU utilization percent averaged over the samples the driver
    /// collected in the last `since`.
    pub fn average_gpu_utilization(&self, since: Duration) -> Result<u32, NvmlError> {
        self.average_usage(SamplingKind::GpuUtilization, since)
    }

    fn average_usage(&self, kind: SamplingKind, since: Duration) -> Result<u32, NvmlError> {
        let samples = self
            .lib
            .device_samples(self.raw, kind, last_seen_micros(since))?;
        if samples.is_empty() {
            return Ok(0);
        }
        let sum: u64 = samples.iter().map(|&v| u64::from(v)).sum();
        Ok((sum / samples.len() as u64) as u32)
    }

    /// Whether per-process accounting is enabled.
    pub fn accounting_mode(&self) -> Result<bool, NvmlError> {
        self.lib.device_accounting_mode(self.raw)
    }

    /// Accounting statistics for one process.
    pub fn accounting_stats(&self, pid: u32) -> Result<AccountingStats, NvmlError> {
        self.lib.device_accounting_stats(self.raw, pid)
    }

    /// PIDs with accounting statistics available.
    pub fn accounting_pids(&self) -> Result<Vec<u32>, NvmlError> {
        self.lib.device_accounting_pids(self.raw)
    }

    /// Capacity of the driver's circular accounting buffer.
    pub fn accounting_buffer_size(&self) -> Result<u32, NvmlError> {
        self.lib.device_accounting_buffer_size(self.raw)
    }

    /// Per-process utilization over the last `since`, with the empty
    /// placeholder slots the driver pads its buffer with filtered out.
    pub fn process_utilization(&self, since: Duration) -> Result<Vec<ProcessSample>, NvmlError> {
        let samples = self
            .lib
            .device_process_utilization(self.raw, last_seen_micros(since))?;
        Ok(samples.into_iter().filter(|s| s.pid != 0).collect())
    }
}

/// `now - since` as a unix timestamp in microseconds, saturating at 0.
fn last_seen_micros(since: Duration) -> u64 {
    SystemTime::now()
        .checked_sub(since)
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDevice, MockLoader, MockState};
    use crate::nvml::Nvml;

    use std::sync::Arc;

    fn nvml_with_device(device: MockDevice) -> Nvml {
        let state = Arc::new(MockState::default().with_device(device));
        let mut nvml = Nvml::with_loader(Box::new(MockLoader::new(state)));
        nvml.init().unwrap();
        nvml
    }

    #[test]
    fn test_device_identity_queries() {
        let nvml = nvml_with_device(
            MockDevice::new(0)
                .with_name("Mock RTX 4090")
                .with_uuid("GPU-MOCK-1234")
                .with_minor_number(3),
        );
        let device = nvml.device_by_index(0).unwrap();

        assert_eq!(device.index(), 0);
        assert_eq!(device.name().unwrap(), "Mock RTX 4090");
        assert_eq!(device.uuid().unwrap(), "GPU-MOCK-1234");
        assert_eq!(device.minor_number().unwrap(), 3);
    }

    #[test]
    fn test_device_by_invalid_index() {
        let nvml = nvml_with_device(MockDevice::new(0));
        assert_eq!(nvml.device_by_index(7).unwrap_err(), NvmlError::NotFound);
    }

    #[test]
    fn test_average_of_scripted_samples() {
        let nvml = nvml_with_device(
            MockDevice::new(0)
                .with_power_samples(vec![100_000, 200_000, 300_000])
                .with_utilization_samples(vec![10, 20, 30, 40]),
        );
        let device = nvml.device_by_index(0).unwrap();

        let window = Duration::from_secs(10);
        assert_eq!(device.average_power_usage(window).unwrap(), 200_000);
        assert_eq!(device.average_gpu_utilization(window).unwrap(), 25);
    }

    #[test]
    fn test_average_of_empty_buffer_is_zero() {
        let nvml = nvml_with_device(MockDevice::new(0));
        let device = nvml.device_by_index(0).unwrap();

        assert_eq!(
            device.average_power_usage(Duration::from_secs(10)).unwrap(),
            0
        );
    }

    #[test]
    fn test_process_utilization_filters_empty_slots() {
        let samples = vec![
            ProcessSample {
                pid: 4242,
                sm_util: 55,
                ..Default::default()
            },
            // Placeholder slot the driver left unfilled.
            ProcessSample::default(),
            ProcessSample {
                pid: 99,
                sm_util: 5,
                ..Default::default()
            },
        ];
        let nvml = nvml_with_device(MockDevice::new(0).with_process_samples(samples));
        let device = nvml.device_by_index(0).unwrap();

        let reported = device.process_utilization(Duration::from_secs(10)).unwrap();
        assert_eq!(reported.len(), 2);
        assert!(reported.iter().all(|s| s.pid != 0));
    }

    #[test]
    fn test_accounting_queries() {
        let stats = AccountingStats {
            gpu_utilization: 80,
            max_memory_usage: 1024 * 1024 * 1024,
            is_running: true,
            ..Default::default()
        };
        let nvml = nvml_with_device(
            MockDevice::new(0)
                .with_accounting_enabled(true)
                .with_accounting_stats(4242, stats),
        );
        let device = nvml.device_by_index(0).unwrap();

        assert!(device.accounting_mode().unwrap());
        assert_eq!(device.accounting_pids().unwrap(), vec![4242]);
        assert_eq!(device.accounting_stats(4242).unwrap(), stats);
        assert!(device.accounting_buffer_size().unwrap() >= 1);

        // No stats recorded for this PID.
        assert_eq!(
            device.accounting_stats(1).unwrap_err(),
            NvmlError::NotFound
        );
    }

    #[test]
    fn test_metric_queries_forward_mock_values() {
        let memory = MemoryInfo {
            total: 16 * 1024 * 1024 * 1024,
            free: 12 * 1024 * 1024 * 1024,
            used: 4 * 1024 * 1024 * 1024,
        };
        let nvml = nvml_with_device(
            MockDevice::new(0)
                .with_temperature(62)
                .with_fan_speed(45)
                .with_power_usage(180_000)
                .with_memory(memory)
                .with_utilization(Utilization { gpu: 77, memory: 31 }),
        );
        let device = nvml.device_by_index(0).unwrap();

        assert_eq!(device.temperature().unwrap(), 62);
        assert_eq!(device.fan_speed().unwrap(), 45);
        assert_eq!(device.power_usage().unwrap(), 180_000);
        assert_eq!(device.memory_info().unwrap(), memory);
        assert_eq!(device.utilization_rates().unwrap().gpu, 77);
    }

    #[test]
    fn test_last_seen_micros_saturates() {
        // A window far larger than the epoch offset must not panic.
        assert_eq!(last_seen_micros(Duration::from_secs(u64::MAX / 2)), 0);
    }
}
