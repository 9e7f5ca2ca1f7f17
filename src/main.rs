//! dynvml - GPU monitoring via runtime-loaded NVML
//!
//! A command-line tool for querying NVIDIA GPU metrics through NVML
//! loaded at run time, so the binary works (and fails politely) on hosts
//! without the NVIDIA driver.

use clap::Parser;
use dynvml::cli::args::{generate_completions, Cli, Commands};
use dynvml::commands::{run_info, run_list, run_processes};
use dynvml::error::AppError;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Set log level based on verbose flag
    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    // Run the appropriate command
    let result = run(&cli);

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    match &cli.command {
        Commands::List => run_list(cli.format),

        Commands::Info(args) => run_info(args, cli.format, cli.gpu),

        Commands::Processes(args) => run_processes(args, cli.format, cli.gpu),

        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Nvml(dynvml::error::NvmlError::LibraryNotFound) => {
            eprintln!();
            eprintln!("Hint: Make sure the NVIDIA driver is installed.");
            eprintln!("      On Linux, install the nvidia-utils package.");
        }
        AppError::Nvml(dynvml::error::NvmlError::DriverNotLoaded) => {
            eprintln!();
            eprintln!("Hint: The library is present but the kernel driver is not running.");
            eprintln!("      Check 'lsmod | grep nvidia'.");
        }
        AppError::Nvml(dynvml::error::NvmlError::NoPermission) => {
            eprintln!();
            eprintln!("Hint: Try running with sudo or as root.");
        }
        AppError::NoGpusFound => {
            eprintln!();
            eprintln!("Hint: Make sure you have an NVIDIA GPU installed.");
            eprintln!("      Check 'nvidia-smi' for GPU detection.");
        }
        _ => {}
    }
}
