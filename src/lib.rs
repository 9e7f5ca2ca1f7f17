//! dynvml - runtime-loaded NVML bindings
//!
//! This library talks to NVIDIA's GPU management library (NVML) by loading
//! `libnvidia-ml.so.1` at run time instead of linking against it, so
//! binaries built with it start on hosts without the NVIDIA driver and
//! report a "library not found" error instead of failing to load.
//!
//! # Modules
//!
//! - [`cli`]: Command-line interface definitions
//! - [`commands`]: Command handlers
//! - [`domain`]: Metric data types
//! - [`error`]: Error types
//! - [`ffi`]: Raw NVML ABI and the dynamic loader
//! - [`nvml`]: NVML abstraction layer
//!
//! # Example
//!
//! ```no_run
//! use dynvml::Nvml;
//!
//! # fn main() -> Result<(), dynvml::NvmlError> {
//! let mut nvml = Nvml::new();
//! nvml.init()?;
//! for i in 0..nvml.device_count()? {
//!     let device = nvml.device_by_index(i)?;
//!     println!("[{}] {}", i, device.name()?);
//! }
//! nvml.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod domain;
pub mod error;
pub mod ffi;
pub mod nvml;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{AppError, NvmlError, Result};
pub use nvml::{Device, Nvml};
