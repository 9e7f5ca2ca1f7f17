//! Device memory (VRAM) metrics

use serde::{Deserialize, Serialize};
use std::fmt;

const MIB: u64 = 1024 * 1024;

/// Framebuffer memory usage in bytes, as reported by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Total installed framebuffer memory
    pub total: u64,
    /// Unallocated framebuffer memory
    pub free: u64,
    /// Allocated framebuffer memory
    pub used: u64,
}

impl MemoryInfo {
    /// Total memory in MiB
    pub fn total_mib(&self) -> u64 {
        self.total / MIB
    }

    /// Used memory in MiB
    pub fn used_mib(&self) -> u64 {
        self.used / MIB
    }

    /// Used memory as a percentage of total (0 when total is unknown)
    pub fn percent_used(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.used as f64 / self.total as f64) * 100.0).round() as u32
    }
}

impl fmt::Display for MemoryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} MiB / {} MiB ({}%)",
            self.used_mib(),
            self.total_mib(),
            self.percent_used()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_info_mib() {
        let info = MemoryInfo {
            total: 8 * 1024 * MIB,
            free: 6 * 1024 * MIB,
            used: 2 * 1024 * MIB,
        };
        assert_eq!(info.total_mib(), 8192);
        assert_eq!(info.used_mib(), 2048);
        assert_eq!(info.percent_used(), 25);
    }

    #[test]
    fn test_memory_info_percent_zero_total() {
        let info = MemoryInfo::default();
        assert_eq!(info.percent_used(), 0);
    }

    #[test]
    fn test_memory_info_display() {
        let info = MemoryInfo {
            total: 4096 * MIB,
            free: 3072 * MIB,
            used: 1024 * MIB,
        };
        assert_eq!(info.to_string(), "1024 MiB / 4096 MiB (25%)");
    }
}
