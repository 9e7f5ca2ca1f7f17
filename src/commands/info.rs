//! Info command implementation
//!
//! Shows metrics for one or all GPUs. Metrics a device does not support
//! are skipped rather than failing the whole command.

use crate::cli::args::{InfoArgs, OutputFormat};
use crate::cli::output::{print_output, GpuInfoOutput};
use crate::commands::{resolve_indices, with_nvml};
use crate::error::Result;

use std::time::Duration;

/// Execute the info command
pub fn run_info(args: &InfoArgs, format: OutputFormat, gpu: Option<u32>) -> Result<()> {
    with_nvml(|nvml| {
        let indices = resolve_indices(nvml, gpu)?;
        let window = Duration::from_secs(args.window);
        let show_all = args.show_all();

        for (n, &index) in indices.iter().enumerate() {
            let device = nvml.device_by_index(index)?;

            let memory = (show_all || args.memory)
                .then(|| device.memory_info().ok())
                .flatten();

            let (utilization, encoder, decoder) = if show_all || args.utilization {
                (
                    device.utilization_rates().ok(),
                    device.encoder_utilization().ok(),
                    device.decoder_utilization().ok(),
                )
            } else {
                (None, None, None)
            };

            let (power_mw, average_power_mw, average_gpu_utilization) = if show_all || args.power
            {
                (
                    device.power_usage().ok(),
                    device.average_power_usage(window).ok(),
                    device.average_gpu_utilization(window).ok(),
                )
            } else {
                (None, None, None)
            };

            let (temperature_c, fan_speed_percent) = if show_all || args.thermal {
                (device.temperature().ok(), device.fan_speed().ok())
            } else {
                (None, None)
            };

            let output = GpuInfoOutput {
                index,
                name: device.name()?,
                memory,
                utilization,
                encoder,
                decoder,
                power_mw,
                average_power_mw,
                average_gpu_utilization,
                temperature_c,
                fan_speed_percent,
            };

            print_output(&output, format)?;

            if n + 1 < indices.len() {
                println!();
            }
        }

        Ok(())
    })
}
