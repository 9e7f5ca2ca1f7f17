//! Mock implementations for testing
//!
//! Provides a scripted loader and library for unit testing the lifecycle
//! and query paths without the NVIDIA driver. `MockState` is shared
//! between the test, the loader, and the library it hands out, so tests
//! can inject failures and observe call counts after the fact.

use crate::domain::{AccountingStats, CodecUtilization, MemoryInfo, ProcessSample, SamplingKind, Utilization};
use crate::error::NvmlError;
use crate::ffi::RawDevice;
use crate::nvml::{NvmlApi, NvmlLoader};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const MIB: u64 = 1024 * 1024;

/// One scripted GPU.
#[derive(Debug, Clone)]
pub struct MockDevice {
    index: u32,
    name: String,
    uuid: String,
    minor_number: u32,
    memory: MemoryInfo,
    utilization: Utilization,
    power_usage: u32,
    temperature: u32,
    fan_speed: u32,
    encoder: CodecUtilization,
    decoder: CodecUtilization,
    power_samples: Vec<u32>,
    utilization_samples: Vec<u32>,
    process_samples: Vec<ProcessSample>,
    accounting_enabled: bool,
    accounting: HashMap<u32, AccountingStats>,
    accounting_buffer_size: u32,
}

impl MockDevice {
    /// Create a mock device with plausible defaults
    pub fn new(index: u32) -> Self {
        Self {
            index,
            name: format!("Mock GPU {}", index),
            uuid: format!("GPU-MOCK-{:04}", index),
            minor_number: index,
            memory: MemoryInfo {
                total: 8192 * MIB,
                free: 7168 * MIB,
                used: 1024 * MIB,
            },
            utilization: Utilization { gpu: 15, memory: 10 },
            power_usage: 120_000,
            temperature: 45,
            fan_speed: 30,
            encoder: CodecUtilization::default(),
            decoder: CodecUtilization::default(),
            power_samples: Vec::new(),
            utilization_samples: Vec::new(),
            process_samples: Vec::new(),
            accounting_enabled: false,
            accounting: HashMap::new(),
            accounting_buffer_size: 4000,
        }
    }

    /// Builder: set name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: set UUID
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    /// Builder: set minor number
    pub fn with_minor_number(mut self, minor: u32) -> Self {
        self.minor_number = minor;
        self
    }

    /// Builder: set memory info
    pub fn with_memory(mut self, memory: MemoryInfo) -> Self {
        self.memory = memory;
        self
    }

    /// Builder: set utilization rates
    pub fn with_utilization(mut self, utilization: Utilization) -> Self {
        self.utilization = utilization;
        self
    }

    /// Builder: set power usage in milliwatts
    pub fn with_power_usage(mut self, milliwatts: u32) -> Self {
        self.power_usage = milliwatts;
        self
    }

    /// Builder: set temperature in Celsius
    pub fn with_temperature(mut self, celsius: u32) -> Self {
        self.temperature = celsius;
        self
    }

    /// Builder: set fan speed percent
    pub fn with_fan_speed(mut self, percent: u32) -> Self {
        self.fan_speed = percent;
        self
    }

    /// Builder: set the power sample buffer (milliwatts)
    pub fn with_power_samples(mut self, samples: Vec<u32>) -> Self {
        self.power_samples = samples;
        self
    }

    /// Builder: set the utilization sample buffer (percent)
    pub fn with_utilization_samples(mut self, samples: Vec<u32>) -> Self {
        self.utilization_samples = samples;
        self
    }

    /// Builder: set per-process utilization samples
    pub fn with_process_samples(mut self, samples: Vec<ProcessSample>) -> Self {
        self.process_samples = samples;
        self
    }

    /// Builder: enable or disable accounting mode
    pub fn with_accounting_enabled(mut self, enabled: bool) -> Self {
        self.accounting_enabled = enabled;
        self
    }

    /// Builder: record accounting stats for a PID
    pub fn with_accounting_stats(mut self, pid: u32, stats: AccountingStats) -> Self {
        self.accounting.insert(pid, stats);
        self
    }
}

/// Shared script and observation point for a mock loader/library pair.
#[derive(Debug)]
pub struct MockState {
    devices: Vec<MockDevice>,
    driver_version: String,
    nvml_version: String,
    load_error: Mutex<Option<NvmlError>>,
    init_error: Mutex<Option<NvmlError>>,
    shutdown_error: Mutex<Option<NvmlError>>,
    unload_error: Mutex<Option<NvmlError>>,
    load_calls: AtomicUsize,
    init_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
    unload_calls: AtomicUsize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            devices: vec![MockDevice::new(0)],
            driver_version: "535.154.05".to_string(),
            nvml_version: "12.535.154.05".to_string(),
            load_error: Mutex::new(None),
            init_error: Mutex::new(None),
            shutdown_error: Mutex::new(None),
            unload_error: Mutex::new(None),
            load_calls: AtomicUsize::new(0),
            init_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
            unload_calls: AtomicUsize::new(0),
        }
    }
}

impl MockState {
    /// Builder: install a device at its index, growing the device list
    /// with defaults as needed.
    pub fn with_device(mut self, device: MockDevice) -> Self {
        let index = device.index as usize;
        while self.devices.len() <= index {
            self.devices.push(MockDevice::new(self.devices.len() as u32));
        }
        self.devices[index] = device;
        self
    }

    /// Builder: remove all devices
    pub fn without_devices(mut self) -> Self {
        self.devices.clear();
        self
    }

    /// Script the next loads to fail
    pub fn fail_load(&self, err: NvmlError) {
        *self.load_error.lock().unwrap() = Some(err);
    }

    /// Script the library's init entry point to fail
    pub fn fail_init(&self, err: NvmlError) {
        *self.init_error.lock().unwrap() = Some(err);
    }

    /// Script the library's shutdown entry point to fail
    pub fn fail_shutdown(&self, err: NvmlError) {
        *self.shutdown_error.lock().unwrap() = Some(err);
    }

    /// Let shutdown succeed again
    pub fn clear_shutdown_failure(&self) {
        *self.shutdown_error.lock().unwrap() = None;
    }

    /// Script the unload step to fail
    pub fn fail_unload(&self, err: NvmlError) {
        *self.unload_error.lock().unwrap() = Some(err);
    }

    /// Times the loader was asked to load
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Times the library's init entry point ran
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Times the library's shutdown entry point ran
    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    /// Times the library image was released
    pub fn unload_calls(&self) -> usize {
        self.unload_calls.load(Ordering::SeqCst)
    }
}

/// Scripted loader handing out [`MockNvml`] libraries.
#[derive(Debug)]
pub struct MockLoader {
    state: Arc<MockState>,
}

impl MockLoader {
    pub fn new(state: Arc<MockState>) -> Self {
        Self { state }
    }
}

impl NvmlLoader for MockLoader {
    fn load(&self) -> Result<Box<dyn NvmlApi>, NvmlError> {
        self.state.load_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = *self.state.load_error.lock().unwrap() {
            return Err(err);
        }
        Ok(Box::new(MockNvml {
            state: Arc::clone(&self.state),
        }))
    }
}

/// In-process stand-in for a loaded NVML library.
#[derive(Debug)]
pub struct MockNvml {
    state: Arc<MockState>,
}

impl MockNvml {
    fn device(&self, raw: RawDevice) -> Result<&MockDevice, NvmlError> {
        let index = (raw as usize)
            .checked_sub(1)
            .ok_or(NvmlError::InvalidArgument)?;
        self.state
            .devices
            .get(index)
            .ok_or(NvmlError::InvalidArgument)
    }
}

impl NvmlApi for MockNvml {
    fn init(&self) -> Result<(), NvmlError> {
        self.state.init_calls.fetch_add(1, Ordering::SeqCst);
        match *self.state.init_error.lock().unwrap() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn shutdown(&self) -> Result<(), NvmlError> {
        self.state.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        match *self.state.shutdown_error.lock().unwrap() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn driver_version(&self) -> Result<String, NvmlError> {
        Ok(self.state.driver_version.clone())
    }

    fn nvml_version(&self) -> Result<String, NvmlError> {
        Ok(self.state.nvml_version.clone())
    }

    fn process_name(&self, pid: u32) -> Result<String, NvmlError> {
        Ok(format!("mock-process-{}", pid))
    }

    fn device_count(&self) -> Result<u32, NvmlError> {
        Ok(self.state.devices.len() as u32)
    }

    fn device_handle_by_index(&self, index: u32) -> Result<RawDevice, NvmlError> {
        if (index as usize) < self.state.devices.len() {
            // Non-null tag the query methods can map back to an index.
            Ok((index as usize + 1) as RawDevice)
        } else {
            Err(NvmlError::NotFound)
        }
    }

    fn device_minor_number(&self, device: RawDevice) -> Result<u32, NvmlError> {
        Ok(self.device(device)?.minor_number)
    }

    fn device_uuid(&self, device: RawDevice) -> Result<String, NvmlError> {
        Ok(self.device(device)?.uuid.clone())
    }

    fn device_name(&self, device: RawDevice) -> Result<String, NvmlError> {
        Ok(self.device(device)?.name.clone())
    }

    fn device_memory_info(&self, device: RawDevice) -> Result<MemoryInfo, NvmlError> {
        Ok(self.device(device)?.memory)
    }

    fn device_utilization_rates(&self, device: RawDevice) -> Result<Utilization, NvmlError> {
        Ok(self.device(device)?.utilization)
    }

    fn device_power_usage(&self, device: RawDevice) -> Result<u32, NvmlError> {
        Ok(self.device(device)?.power_usage)
    }

    fn device_temperature(&self, device: RawDevice) -> Result<u32, NvmlError> {
        Ok(self.device(device)?.temperature)
    }

    fn device_fan_speed(&self, device: RawDevice) -> Result<u32, NvmlError> {
        Ok(self.device(device)?.fan_speed)
    }

    fn device_encoder_utilization(
        &self,
        device: RawDevice,
    ) -> Result<CodecUtilization, NvmlError> {
        Ok(self.device(device)?.encoder)
    }

    fn device_decoder_utilization(
        &self,
        device: RawDevice,
    ) -> Result<CodecUtilization, NvmlError> {
        Ok(self.device(device)?.decoder)
    }

    fn device_samples(
        &self,
        device: RawDevice,
        kind: SamplingKind,
        _last_seen_us: u64,
    ) -> Result<Vec<u32>, NvmlError> {
        let device = self.device(device)?;
        Ok(match kind {
            SamplingKind::TotalPower => device.power_samples.clone(),
            SamplingKind::GpuUtilization => device.utilization_samples.clone(),
        })
    }

    fn device_accounting_mode(&self, device: RawDevice) -> Result<bool, NvmlError> {
        Ok(self.device(device)?.accounting_enabled)
    }

    fn device_accounting_stats(
        &self,
        device: RawDevice,
        pid: u32,
    ) -> Result<AccountingStats, NvmlError> {
        self.device(device)?
            .accounting
            .get(&pid)
            .copied()
            .ok_or(NvmlError::NotFound)
    }

    fn device_accounting_pids(&self, device: RawDevice) -> Result<Vec<u32>, NvmlError> {
        let mut pids: Vec<u32> = self.device(device)?.accounting.keys().copied().collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn device_accounting_buffer_size(&self, device: RawDevice) -> Result<u32, NvmlError> {
        Ok(self.device(device)?.accounting_buffer_size)
    }

    fn device_process_utilization(
        &self,
        device: RawDevice,
        _last_seen_us: u64,
    ) -> Result<Vec<ProcessSample>, NvmlError> {
        Ok(self.device(device)?.process_samples.clone())
    }

    fn unload(self: Box<Self>) -> Result<(), NvmlError> {
        self.state.unload_calls.fetch_add(1, Ordering::SeqCst);
        match *self.state.unload_error.lock().unwrap() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_failure_is_scripted() {
        let state = Arc::new(MockState::default());
        let loader = MockLoader::new(Arc::clone(&state));

        state.fail_load(NvmlError::LibraryNotFound);
        assert_eq!(loader.load().err(), Some(NvmlError::LibraryNotFound));
        assert_eq!(state.load_calls(), 1);
    }

    #[test]
    fn test_with_device_grows_list() {
        let state = MockState::default().with_device(MockDevice::new(2).with_name("third"));
        assert_eq!(state.devices.len(), 3);
        assert_eq!(state.devices[2].name, "third");
        // Gap slots get defaults.
        assert_eq!(state.devices[1].name, "Mock GPU 1");
    }

    #[test]
    fn test_handle_round_trip() {
        let state = Arc::new(MockState::default());
        let lib = MockLoader::new(state).load().unwrap();

        let raw = lib.device_handle_by_index(0).unwrap();
        assert!(!raw.is_null());
        assert_eq!(lib.device_name(raw).unwrap(), "Mock GPU 0");
    }
}
