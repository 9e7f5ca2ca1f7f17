//! Per-process GPU metrics

use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// One per-process utilization sample from the driver's sample buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    /// CPU timestamp in microseconds
    pub timestamp_us: u64,
    /// SM (3D/compute) utilization percent
    pub sm_util: u32,
    /// Framebuffer memory utilization percent
    pub mem_util: u32,
    /// Encoder utilization percent
    pub enc_util: u32,
    /// Decoder utilization percent
    pub dec_util: u32,
}

/// Lifetime accounting statistics for one process, as tracked by the
/// driver's accounting mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingStats {
    /// Percent of the process lifetime during which kernels executed
    pub gpu_utilization: u32,
    /// Percent of the process lifetime during which memory was in use
    pub memory_utilization: u32,
    /// Peak memory allocation in bytes
    pub max_memory_usage: u64,
    /// Active compute-context time in milliseconds (0 while running)
    pub time_ms: u64,
    /// Process start time, CPU timestamp in microseconds
    pub start_time_us: u64,
    /// Whether the process was still running when queried
    pub is_running: bool,
}

impl AccountingStats {
    /// Peak memory allocation in MiB
    pub fn max_memory_mib(&self) -> u64 {
        self.max_memory_usage / MIB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accounting_stats_max_memory_mib() {
        let stats = AccountingStats {
            max_memory_usage: 512 * MIB,
            ..Default::default()
        };
        assert_eq!(stats.max_memory_mib(), 512);
    }

    #[test]
    fn test_process_sample_default() {
        let sample = ProcessSample::default();
        assert_eq!(sample.pid, 0);
        assert_eq!(sample.sm_util, 0);
    }
}
