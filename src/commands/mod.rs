//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command.

pub mod info;
pub mod list;
pub mod processes;

pub use info::run_info;
pub use list::run_list;
pub use processes::run_processes;

use crate::error::{AppError, Result};
use crate::nvml::Nvml;

/// Run `f` against an initialized NVML instance, shutting it down
/// afterwards regardless of the outcome.
pub(crate) fn with_nvml<T>(f: impl FnOnce(&Nvml) -> Result<T>) -> Result<T> {
    let mut nvml = Nvml::new();
    nvml.init()?;

    let result = f(&nvml);

    if let Err(err) = nvml.shutdown() {
        log::warn!("NVML shutdown failed: {err}");
    }

    result
}

/// The device indices a command should operate on: the selected GPU, or
/// every GPU when none was selected.
pub(crate) fn resolve_indices(nvml: &Nvml, gpu: Option<u32>) -> Result<Vec<u32>> {
    if let Some(index) = gpu {
        return Ok(vec![index]);
    }

    let count = nvml.device_count().map_err(AppError::from)?;
    if count == 0 {
        return Err(AppError::NoGpusFound);
    }
    Ok((0..count).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockLoader, MockState};

    use std::sync::Arc;

    #[test]
    fn test_resolve_indices_explicit_gpu() {
        let state = Arc::new(MockState::default());
        let mut nvml = Nvml::with_loader(Box::new(MockLoader::new(state)));
        nvml.init().unwrap();

        let indices = resolve_indices(&nvml, Some(3)).unwrap();
        assert_eq!(indices, vec![3]);
    }

    #[test]
    fn test_resolve_indices_all_gpus() {
        let state = Arc::new(MockState::default());
        let mut nvml = Nvml::with_loader(Box::new(MockLoader::new(state)));
        nvml.init().unwrap();

        let indices = resolve_indices(&nvml, None).unwrap();
        assert_eq!(indices, vec![0]);
    }

    #[test]
    fn test_resolve_indices_no_gpus() {
        let state = Arc::new(MockState::default().without_devices());
        let mut nvml = Nvml::with_loader(Box::new(MockLoader::new(state)));
        nvml.init().unwrap();

        let err = resolve_indices(&nvml, None).unwrap_err();
        assert!(matches!(err, AppError::NoGpusFound));
    }
}
