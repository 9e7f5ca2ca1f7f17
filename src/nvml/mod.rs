//! NVML abstraction layer
//!
//! Trait seams over the dynamically loaded library, the lifecycle owner,
//! and the per-device query surface.

pub mod device;
pub mod traits;
pub mod wrapper;

pub use device::Device;
pub use traits::{NvmlApi, NvmlLoader};
pub use wrapper::Nvml;
