//! Processes command implementation
//!
//! Lists per-process GPU usage over a sampling window, optionally with
//! the driver's lifetime accounting statistics.

use crate::cli::args::{OutputFormat, ProcessesArgs};
use crate::cli::output::{print_output, AccountingEntry, ProcessEntry, ProcessListOutput};
use crate::commands::{resolve_indices, with_nvml};
use crate::error::{NvmlError, Result};
use crate::nvml::Device;

use std::time::Duration;

/// Execute the processes command
pub fn run_processes(args: &ProcessesArgs, format: OutputFormat, gpu: Option<u32>) -> Result<()> {
    with_nvml(|nvml| {
        let indices = resolve_indices(nvml, gpu)?;
        let window = Duration::from_secs(args.window);

        for (n, &index) in indices.iter().enumerate() {
            let device = nvml.device_by_index(index)?;

            // The driver reports NotFound when nothing ran in the window.
            let mut samples = match device.process_utilization(window) {
                Ok(samples) => samples,
                Err(NvmlError::NotFound) => Vec::new(),
                Err(err) => return Err(err.into()),
            };

            samples.sort_by(|a, b| b.sm_util.cmp(&a.sm_util));
            if let Some(top) = args.top {
                samples.truncate(top);
            }

            let processes = samples
                .iter()
                .map(|sample| ProcessEntry {
                    pid: sample.pid,
                    name: nvml
                        .process_name(sample.pid)
                        .unwrap_or_else(|_| "<unknown>".to_string()),
                    sm_util: sample.sm_util,
                    mem_util: sample.mem_util,
                    enc_util: sample.enc_util,
                    dec_util: sample.dec_util,
                })
                .collect();

            let accounting = if args.accounting {
                Some(collect_accounting(&device)?)
            } else {
                None
            };

            let output = ProcessListOutput {
                gpu_index: index,
                gpu_name: device.name()?,
                window_secs: args.window,
                processes,
                accounting,
            };

            print_output(&output, format)?;

            if n + 1 < indices.len() {
                println!();
            }
        }

        Ok(())
    })
}

/// Accounting stats for every PID the driver still tracks on this device.
fn collect_accounting(device: &Device<'_>) -> Result<Vec<AccountingEntry>> {
    if !device.accounting_mode()? {
        log::debug!("accounting mode disabled on GPU {}", device.index());
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for pid in device.accounting_pids()? {
        // A PID can age out of the circular buffer between the two calls.
        let stats = match device.accounting_stats(pid) {
            Ok(stats) => stats,
            Err(NvmlError::NotFound) => continue,
            Err(err) => return Err(err.into()),
        };
        entries.push(AccountingEntry {
            pid,
            gpu_utilization: stats.gpu_utilization,
            memory_utilization: stats.memory_utilization,
            max_memory_mib: stats.max_memory_mib(),
            is_running: stats.is_running,
        });
    }

    Ok(entries)
}
