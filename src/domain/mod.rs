//! Domain types for GPU metrics
//!
//! Plain data carriers for the values NVML reports, decoupled from the raw
//! ABI structs so callers never see C layout details.

pub mod memory;
pub mod process;
pub mod utilization;

pub use memory::MemoryInfo;
pub use process::{AccountingStats, ProcessSample};
pub use utilization::{CodecUtilization, SamplingKind, Utilization};
