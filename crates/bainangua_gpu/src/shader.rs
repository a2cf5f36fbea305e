//! Shader module loader.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bainangua_core::{LoaderError, ResourceKey, Result};
use bainangua_loader::{LoaderDirectory, LoaderOutcome, LoaderRoutine, ResourceLoader};
use futures::FutureExt;
use log::debug;

use crate::context::GpuContext;
use crate::device::{SPIRV_MAGIC, ShaderModule};

/// A SPIR-V file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderFileKey {
    pub path: PathBuf,
}

impl ShaderFileKey {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResourceKey for ShaderFileKey {
    type Resource = ShaderModule;
}

/// Reads the file, validates it and creates a shader module. The unloader
/// destroys the module.
pub fn shader_loader<D>(loader: ResourceLoader<D>, key: ShaderFileKey) -> LoaderRoutine<ShaderModule>
where
    D: LoaderDirectory<Context = GpuContext>,
{
    async move {
        let device = Arc::clone(loader.context().device());
        let bytes = tokio::fs::read(&key.path)
            .await
            .map_err(|err| LoaderError::io(&key.path, err))?;
        let code = spirv_words(&key.path, &bytes)?;
        let module = device.create_shader_module(&code)?;
        debug!("Created {module:?} from {}", key.path.display());

        Ok(LoaderOutcome::new(module).with_unloader(async move {
            device.destroy_shader_module(module);
            Ok(())
        }))
    }
    .boxed()
}

/// Reinterprets little-endian SPIR-V bytes as words.
pub fn spirv_words(path: &Path, bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() || !bytes.len().is_multiple_of(4) {
        return Err(LoaderError::invalid_data(format!(
            "{}: SPIR-V size {} is not a positive multiple of 4",
            path.display(),
            bytes.len()
        )));
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    if words[0] != SPIRV_MAGIC {
        return Err(LoaderError::invalid_data(format!(
            "{}: bad SPIR-V magic {:#010x}",
            path.display(),
            words[0]
        )));
    }
    Ok(words)
}
