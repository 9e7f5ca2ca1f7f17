//! Output formatting utilities
//!
//! Provides table and JSON output formatting for CLI commands.

use crate::cli::args::OutputFormat;
use crate::domain::{CodecUtilization, MemoryInfo, Utilization};
use serde::Serialize;
use std::io::{self, Write};

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

/// GPU list entry for display
#[derive(Debug, Clone, Serialize)]
pub struct GpuListEntry {
    pub index: u32,
    pub name: String,
    pub uuid: String,
    pub minor_number: u32,
}

impl TableDisplay for GpuListEntry {
    fn to_table(&self) -> String {
        format!(
            "[{}] {} (/dev/nvidia{}, UUID: {})",
            self.index, self.name, self.minor_number, self.uuid
        )
    }

    fn to_compact(&self) -> String {
        format!("{}:{}", self.index, self.name)
    }
}

/// GPU list for display
#[derive(Debug, Clone, Serialize)]
pub struct GpuList {
    pub driver_version: String,
    pub nvml_version: String,
    pub gpus: Vec<GpuListEntry>,
}

impl TableDisplay for GpuList {
    fn to_table(&self) -> String {
        let mut output = format!(
            "Driver Version: {} (NVML {})\n",
            self.driver_version, self.nvml_version
        );
        output.push_str(&format!("GPUs Found: {}\n\n", self.gpus.len()));

        for gpu in &self.gpus {
            output.push_str(&gpu.to_table());
            output.push('\n');
        }

        output
    }

    fn to_compact(&self) -> String {
        self.gpus
            .iter()
            .map(|g| g.to_compact())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Metrics for one GPU; absent sections were not requested
#[derive(Debug, Clone, Serialize)]
pub struct GpuInfoOutput {
    pub index: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utilization: Option<Utilization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoder: Option<CodecUtilization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoder: Option<CodecUtilization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_mw: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_power_mw: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_gpu_utilization: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_speed_percent: Option<u32>,
}

impl TableDisplay for GpuInfoOutput {
    fn to_table(&self) -> String {
        let mut output = format!("[{}] {}\n", self.index, self.name);

        if let Some(memory) = &self.memory {
            output.push_str(&format!("  Memory: {}\n", memory));
        }
        if let Some(util) = &self.utilization {
            output.push_str(&format!("  Utilization: {}\n", util));
        }
        if let Some(enc) = &self.encoder {
            output.push_str(&format!("  Encoder: {}\n", enc));
        }
        if let Some(dec) = &self.decoder {
            output.push_str(&format!("  Decoder: {}\n", dec));
        }
        if let Some(mw) = self.power_mw {
            output.push_str(&format!("  Power Draw: {:.1}W\n", mw as f64 / 1000.0));
        }
        if let Some(mw) = self.average_power_mw {
            output.push_str(&format!("  Power Draw (avg): {:.1}W\n", mw as f64 / 1000.0));
        }
        if let Some(avg) = self.average_gpu_utilization {
            output.push_str(&format!("  Utilization (avg): {}%\n", avg));
        }
        if let Some(temp) = self.temperature_c {
            output.push_str(&format!("  Temperature: {}°C\n", temp));
        }
        if let Some(fan) = self.fan_speed_percent {
            output.push_str(&format!("  Fan Speed: {}%\n", fan));
        }

        output
    }

    fn to_compact(&self) -> String {
        format!("{}:{}", self.index, self.name)
    }
}

/// Per-process usage entry for display
#[derive(Debug, Clone, Serialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub sm_util: u32,
    pub mem_util: u32,
    pub enc_util: u32,
    pub dec_util: u32,
}

impl TableDisplay for ProcessEntry {
    fn to_table(&self) -> String {
        format!(
            "  {:>7}  {:<24} sm {:>3}%  mem {:>3}%  enc {:>3}%  dec {:>3}%",
            self.pid, self.name, self.sm_util, self.mem_util, self.enc_util, self.dec_util
        )
    }
}

/// Accounting statistics entry for display
#[derive(Debug, Clone, Serialize)]
pub struct AccountingEntry {
    pub pid: u32,
    pub gpu_utilization: u32,
    pub memory_utilization: u32,
    pub max_memory_mib: u64,
    pub is_running: bool,
}

impl TableDisplay for AccountingEntry {
    fn to_table(&self) -> String {
        format!(
            "  {:>7}  gpu {:>3}%  mem {:>3}%  peak {} MiB  {}",
            self.pid,
            self.gpu_utilization,
            self.memory_utilization,
            self.max_memory_mib,
            if self.is_running { "running" } else { "finished" }
        )
    }
}

/// Process list for one GPU
#[derive(Debug, Clone, Serialize)]
pub struct ProcessListOutput {
    pub gpu_index: u32,
    pub gpu_name: String,
    pub window_secs: u64,
    pub processes: Vec<ProcessEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounting: Option<Vec<AccountingEntry>>,
}

impl TableDisplay for ProcessListOutput {
    fn to_table(&self) -> String {
        let mut output = format!(
            "[{}] {}: {} process(es) in the last {}s\n",
            self.gpu_index,
            self.gpu_name,
            self.processes.len(),
            self.window_secs
        );

        for process in &self.processes {
            output.push_str(&process.to_table());
            output.push('\n');
        }

        if let Some(accounting) = &self.accounting {
            output.push_str("Accounting:\n");
            for entry in accounting {
                output.push_str(&entry.to_table());
                output.push('\n');
            }
        }

        output
    }

    fn to_compact(&self) -> String {
        self.processes
            .iter()
            .map(|p| format!("{}:{}%", p.pid, p.sm_util))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_list_entry_table() {
        let entry = GpuListEntry {
            index: 0,
            name: "GeForce RTX 4090".to_string(),
            uuid: "GPU-abc".to_string(),
            minor_number: 0,
        };
        let table = entry.to_table();
        assert!(table.contains("[0]"));
        assert!(table.contains("GeForce RTX 4090"));
        assert!(table.contains("/dev/nvidia0"));
    }

    #[test]
    fn test_gpu_info_skips_absent_sections() {
        let info = GpuInfoOutput {
            index: 0,
            name: "Mock".to_string(),
            memory: None,
            utilization: None,
            encoder: None,
            decoder: None,
            power_mw: Some(150_000),
            average_power_mw: None,
            average_gpu_utilization: None,
            temperature_c: None,
            fan_speed_percent: None,
        };
        let table = info.to_table();
        assert!(table.contains("Power Draw: 150.0W"));
        assert!(!table.contains("Memory"));

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("power_mw"));
        assert!(!json.contains("memory"));
    }

    #[test]
    fn test_process_list_compact() {
        let output = ProcessListOutput {
            gpu_index: 0,
            gpu_name: "Mock".to_string(),
            window_secs: 10,
            processes: vec![ProcessEntry {
                pid: 42,
                name: "ferris".to_string(),
                sm_util: 80,
                mem_util: 20,
                enc_util: 0,
                dec_util: 0,
            }],
            accounting: None,
        };
        assert_eq!(output.to_compact(), "42:80%");
    }
}
