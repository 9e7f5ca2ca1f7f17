//! Utilization metrics and sampling kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::raw::c_uint;

/// Percent of time over the last sample period during which kernels were
/// executing (`gpu`) and device memory was being read or written (`memory`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utilization {
    pub gpu: u32,
    pub memory: u32,
}

impl fmt::Display for Utilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpu {}%, memory {}%", self.gpu, self.memory)
    }
}

/// Video encoder/decoder utilization with the driver's sampling period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecUtilization {
    /// Percent of time the codec was in use over the last sample period
    pub utilization: u32,
    /// Sampling period in microseconds (driver-chosen, variable)
    pub sampling_period_us: u32,
}

impl fmt::Display for CodecUtilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.utilization)
    }
}

/// Which of the device's internal sample buffers to read.
///
/// Only the two kinds the averaging queries need are exposed; both report
/// unsigned-int sample values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplingKind {
    /// Total power draw samples, in milliwatts
    TotalPower,
    /// GPU utilization samples, in percent
    GpuUtilization,
}

impl SamplingKind {
    /// The `nvmlSamplingType_t` value for this kind.
    pub fn as_raw(&self) -> c_uint {
        match self {
            Self::TotalPower => 0,
            Self::GpuUtilization => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization_display() {
        let util = Utilization { gpu: 85, memory: 40 };
        assert_eq!(util.to_string(), "gpu 85%, memory 40%");
    }

    #[test]
    fn test_sampling_kind_raw_values() {
        assert_eq!(SamplingKind::TotalPower.as_raw(), 0);
        assert_eq!(SamplingKind::GpuUtilization.as_raw(), 1);
    }
}
