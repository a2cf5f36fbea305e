//! Uniform buffer loader.

use std::sync::Arc;

use bainangua_core::ResourceKey;
use bainangua_loader::{LoaderDirectory, LoaderOutcome, LoaderRoutine, ResourceLoader};
use futures::FutureExt;
use log::debug;

use crate::context::GpuContext;
use crate::device::{Buffer, BufferUsage, MemoryLocation};

/// A host-visible uniform buffer of `size` bytes. `slot` tells apart buffers
/// of the same size, e.g. one per frame in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformBufferKey {
    pub size: u64,
    pub slot: u32,
}

impl ResourceKey for UniformBufferKey {
    type Resource = Buffer;
}

pub fn uniform_buffer_loader<D>(loader: ResourceLoader<D>, key: UniformBufferKey) -> LoaderRoutine<Buffer>
where
    D: LoaderDirectory<Context = GpuContext>,
{
    async move {
        let device = Arc::clone(loader.context().device());
        let buffer = device.create_buffer(key.size, BufferUsage::Uniform, MemoryLocation::HostVisible)?;
        debug!("Created uniform {buffer:?} for {key:?}");

        Ok(LoaderOutcome::new(buffer).with_unloader(async move {
            device.destroy_buffer(buffer);
            Ok(())
        }))
    }
    .boxed()
}
