//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// GPU monitoring via runtime-loaded NVML
///
/// Query NVIDIA GPU metrics without a link-time driver dependency.
#[derive(Parser, Debug)]
#[command(name = "dynvml")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Target GPU by index (0-based)
    #[arg(long, global = true)]
    pub gpu: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all detected GPUs
    List,

    /// Show GPU metrics
    Info(InfoArgs),

    /// Show per-process GPU usage
    Processes(ProcessesArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the info command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Show memory information
    #[arg(long)]
    pub memory: bool,

    /// Show utilization (GPU, memory, encoder, decoder)
    #[arg(long)]
    pub utilization: bool,

    /// Show power draw, current and averaged
    #[arg(long)]
    pub power: bool,

    /// Show temperature and fan speed
    #[arg(long)]
    pub thermal: bool,

    /// Averaging window in seconds for the averaged metrics
    #[arg(long, default_value = "10")]
    pub window: u64,
}

impl InfoArgs {
    /// No section flags means every section.
    pub fn show_all(&self) -> bool {
        !(self.memory || self.utilization || self.power || self.thermal)
    }
}

/// Arguments for the processes command
#[derive(Parser, Debug)]
pub struct ProcessesArgs {
    /// Sampling window in seconds
    #[arg(long, default_value = "10")]
    pub window: u64,

    /// Show only the top N processes by SM utilization
    #[arg(long)]
    pub top: Option<usize>,

    /// Include driver accounting statistics
    #[arg(long)]
    pub accounting: bool,
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_list() {
        let args = Cli::try_parse_from(["dynvml", "list"]).unwrap();
        assert!(matches!(args.command, Commands::List));
    }

    #[test]
    fn test_cli_parse_verbose() {
        let args = Cli::try_parse_from(["dynvml", "-v", "list"]).unwrap();
        assert!(args.verbose);
    }

    #[test]
    fn test_cli_parse_gpu_selection() {
        let args = Cli::try_parse_from(["dynvml", "--gpu", "1", "info"]).unwrap();
        assert_eq!(args.gpu, Some(1));
    }

    #[test]
    fn test_cli_parse_info_sections() {
        let args = Cli::try_parse_from(["dynvml", "info", "--power", "--window", "30"]).unwrap();
        if let Commands::Info(info) = args.command {
            assert!(info.power);
            assert!(!info.memory);
            assert!(!info.show_all());
            assert_eq!(info.window, 30);
        } else {
            panic!("Expected Info command");
        }
    }

    #[test]
    fn test_cli_info_defaults_to_all_sections() {
        let args = Cli::try_parse_from(["dynvml", "info"]).unwrap();
        if let Commands::Info(info) = args.command {
            assert!(info.show_all());
            assert_eq!(info.window, 10);
        } else {
            panic!("Expected Info command");
        }
    }

    #[test]
    fn test_cli_parse_processes() {
        let args =
            Cli::try_parse_from(["dynvml", "processes", "--top", "5", "--accounting"]).unwrap();
        if let Commands::Processes(proc_args) = args.command {
            assert_eq!(proc_args.top, Some(5));
            assert!(proc_args.accounting);
            assert_eq!(proc_args.window, 10);
        } else {
            panic!("Expected Processes command");
        }
    }

    #[test]
    fn test_cli_parse_format() {
        let args = Cli::try_parse_from(["dynvml", "--format", "json", "list"]).unwrap();
        assert!(matches!(args.format, OutputFormat::Json));
    }
}
