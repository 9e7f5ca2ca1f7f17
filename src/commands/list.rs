//! List command implementation
//!
//! Lists all detected NVIDIA GPUs.

use crate::cli::args::OutputFormat;
use crate::cli::output::{print_output, GpuList, GpuListEntry};
use crate::commands::with_nvml;
use crate::error::Result;

/// Execute the list command
pub fn run_list(format: OutputFormat) -> Result<()> {
    with_nvml(|nvml| {
        let driver_version = nvml.driver_version()?;
        let nvml_version = nvml.nvml_version()?;
        let count = nvml.device_count()?;

        let mut gpus = Vec::with_capacity(count as usize);
        for i in 0..count {
            let device = nvml.device_by_index(i)?;
            gpus.push(GpuListEntry {
                index: i,
                name: device.name()?,
                uuid: device.uuid()?,
                minor_number: device.minor_number()?,
            });
        }

        let gpu_list = GpuList {
            driver_version,
            nvml_version,
            gpus,
        };

        print_output(&gpu_list, format)?;

        Ok(())
    })
}
