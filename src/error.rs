//! Unified error types for dynvml
//!
//! `NvmlError` maps 1:1 onto NVML's return-code enumeration so that codes
//! coming back from the loaded library survive the trip through the error
//! type unchanged (`raw()` recovers the exact value). `AppError` is the
//! CLI-level wrapper. Uses thiserror for ergonomic error definitions.

use crate::ffi;

use thiserror::Error;

/// Error from the NVML layer, one variant per NVML return code plus the
/// two codes the loader itself produces (library/function not found).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvmlError {
    /// NVML was not initialized (or the library is not loaded yet)
    #[error("NVML has not been initialized")]
    Uninitialized,

    /// Invalid argument passed to NVML
    #[error("Invalid argument")]
    InvalidArgument,

    /// Operation not supported by this GPU or driver
    #[error("Operation not supported on this device")]
    NotSupported,

    /// Insufficient permissions
    #[error("Insufficient permissions. Try running with sudo.")]
    NoPermission,

    /// NVML was already initialized
    #[error("NVML is already initialized")]
    AlreadyInitialized,

    /// Requested object (device, process, sample) was not found
    #[error("Requested object was not found")]
    NotFound,

    /// Supplied buffer was too small
    #[error("Supplied buffer is too small")]
    InsufficientSize,

    /// Device has insufficient power
    #[error("Device has insufficient external power")]
    InsufficientPower,

    /// NVIDIA driver is not running
    #[error("NVIDIA driver is not loaded")]
    DriverNotLoaded,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Interrupt request issue
    #[error("Interrupt request issue with the GPU")]
    IrqIssue,

    /// The NVML shared library could not be loaded
    #[error("NVML library not found. Is the NVIDIA driver installed?")]
    LibraryNotFound,

    /// A required entry point is missing from the loaded library
    #[error("A required function is missing from the NVML library")]
    FunctionNotFound,

    /// infoROM is corrupted
    #[error("GPU infoROM is corrupted")]
    CorruptedInforom,

    /// GPU is lost (fallen off bus, etc.)
    #[error("GPU is lost or has become inaccessible")]
    GpuLost,

    /// Unknown NVML error
    #[error("Unknown NVML error")]
    Unknown,

    /// Return code outside the known enumeration
    #[error("Unrecognized NVML return code {0}")]
    Other(u32),
}

impl NvmlError {
    /// Map a raw NVML return code to an error.
    ///
    /// Success (0) is not an error; use [`NvmlError::check`] on call
    /// results instead of passing 0 here.
    pub fn from_raw(raw: ffi::RawResult) -> Self {
        match raw {
            ffi::NVML_ERROR_UNINITIALIZED => Self::Uninitialized,
            ffi::NVML_ERROR_INVALID_ARGUMENT => Self::InvalidArgument,
            ffi::NVML_ERROR_NOT_SUPPORTED => Self::NotSupported,
            ffi::NVML_ERROR_NO_PERMISSION => Self::NoPermission,
            ffi::NVML_ERROR_ALREADY_INITIALIZED => Self::AlreadyInitialized,
            ffi::NVML_ERROR_NOT_FOUND => Self::NotFound,
            ffi::NVML_ERROR_INSUFFICIENT_SIZE => Self::InsufficientSize,
            ffi::NVML_ERROR_INSUFFICIENT_POWER => Self::InsufficientPower,
            ffi::NVML_ERROR_DRIVER_NOT_LOADED => Self::DriverNotLoaded,
            ffi::NVML_ERROR_TIMEOUT => Self::Timeout,
            ffi::NVML_ERROR_IRQ_ISSUE => Self::IrqIssue,
            ffi::NVML_ERROR_LIBRARY_NOT_FOUND => Self::LibraryNotFound,
            ffi::NVML_ERROR_FUNCTION_NOT_FOUND => Self::FunctionNotFound,
            ffi::NVML_ERROR_CORRUPTED_INFOROM => Self::CorruptedInforom,
            ffi::NVML_ERROR_GPU_IS_LOST => Self::GpuLost,
            ffi::NVML_ERROR_UNKNOWN => Self::Unknown,
            other => Self::Other(other),
        }
    }

    /// The raw NVML return code this error corresponds to.
    pub fn raw(&self) -> ffi::RawResult {
        match self {
            Self::Uninitialized => ffi::NVML_ERROR_UNINITIALIZED,
            Self::InvalidArgument => ffi::NVML_ERROR_INVALID_ARGUMENT,
            Self::NotSupported => ffi::NVML_ERROR_NOT_SUPPORTED,
            Self::NoPermission => ffi::NVML_ERROR_NO_PERMISSION,
            Self::AlreadyInitialized => ffi::NVML_ERROR_ALREADY_INITIALIZED,
            Self::NotFound => ffi::NVML_ERROR_NOT_FOUND,
            Self::InsufficientSize => ffi::NVML_ERROR_INSUFFICIENT_SIZE,
            Self::InsufficientPower => ffi::NVML_ERROR_INSUFFICIENT_POWER,
            Self::DriverNotLoaded => ffi::NVML_ERROR_DRIVER_NOT_LOADED,
            Self::Timeout => ffi::NVML_ERROR_TIMEOUT,
            Self::IrqIssue => ffi::NVML_ERROR_IRQ_ISSUE,
            Self::LibraryNotFound => ffi::NVML_ERROR_LIBRARY_NOT_FOUND,
            Self::FunctionNotFound => ffi::NVML_ERROR_FUNCTION_NOT_FOUND,
            Self::CorruptedInforom => ffi::NVML_ERROR_CORRUPTED_INFOROM,
            Self::GpuLost => ffi::NVML_ERROR_GPU_IS_LOST,
            Self::Unknown => ffi::NVML_ERROR_UNKNOWN,
            Self::Other(raw) => *raw,
        }
    }

    /// Turn a raw NVML call result into a `Result`.
    pub fn check(raw: ffi::RawResult) -> std::result::Result<(), NvmlError> {
        if raw == ffi::NVML_SUCCESS {
            Ok(())
        } else {
            Err(Self::from_raw(raw))
        }
    }
}

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from NVML operations
    #[error("NVML error: {0}")]
    Nvml(#[from] NvmlError),

    /// No GPUs detected in the system
    #[error("No NVIDIA GPUs detected")]
    NoGpusFound,

    /// IO error (output writing)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_success() {
        assert!(NvmlError::check(ffi::NVML_SUCCESS).is_ok());
    }

    #[test]
    fn test_check_failure() {
        let err = NvmlError::check(ffi::NVML_ERROR_DRIVER_NOT_LOADED).unwrap_err();
        assert_eq!(err, NvmlError::DriverNotLoaded);
    }

    #[test]
    fn test_raw_round_trip() {
        for raw in (1..=15).chain([999]) {
            assert_eq!(NvmlError::from_raw(raw).raw(), raw);
        }
    }

    #[test]
    fn test_unrecognized_code_round_trip() {
        let err = NvmlError::from_raw(42);
        assert_eq!(err, NvmlError::Other(42));
        assert_eq!(err.raw(), 42);
    }

    #[test]
    fn test_library_not_found_display() {
        let err = NvmlError::LibraryNotFound;
        assert!(err.to_string().contains("NVIDIA driver"));
    }

    #[test]
    fn test_error_conversion() {
        let nvml_err = NvmlError::GpuLost;
        let app_err: AppError = nvml_err.into();
        assert!(matches!(app_err, AppError::Nvml(NvmlError::GpuLost)));
    }
}
