//! Command pool and command buffer loaders.
//!
//! A command buffer key names the pool it is allocated from. Loading the
//! buffer loads the pool as a dependency, so every buffer on one pool shares a
//! single pool entry and the pool is destroyed after the last buffer goes.

use std::sync::Arc;

use bainangua_core::ResourceKey;
use bainangua_loader::{LoaderDirectory, LoaderOutcome, LoaderRoutine, LoadsKey, ResourceLoader};
use futures::FutureExt;
use log::{debug, warn};

use crate::context::GpuContext;
use crate::device::{CommandBuffer, CommandPool};

/// Identifies a command pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandPoolKey {
    /// Long-lived pool for per-frame draw recording.
    MainDraw { queue_family: u32 },
    /// Pool for short-lived one-off submissions such as uploads.
    Transient { queue_family: u32 },
}

impl CommandPoolKey {
    #[must_use]
    pub fn queue_family(self) -> u32 {
        match self {
            Self::MainDraw { queue_family } | Self::Transient { queue_family } => queue_family,
        }
    }

    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl ResourceKey for CommandPoolKey {
    type Resource = CommandPool;
}

/// Identifies one command buffer of a pool.
///
/// `index` only distinguishes buffers; it is not a device-side value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferKey {
    pub source_pool: CommandPoolKey,
    pub resettable: bool,
    pub index: u32,
}

impl ResourceKey for CommandBufferKey {
    type Resource = CommandBuffer;
}

pub fn command_pool_loader<D>(loader: ResourceLoader<D>, key: CommandPoolKey) -> LoaderRoutine<CommandPool>
where
    D: LoaderDirectory<Context = GpuContext>,
{
    async move {
        let device = Arc::clone(loader.context().device());
        let pool = device.create_command_pool(key.queue_family(), key.is_transient())?;
        debug!("Created {pool:?} for {key:?}");

        Ok(LoaderOutcome::new(pool).with_unloader(async move {
            device.destroy_command_pool(pool);
            Ok(())
        }))
    }
    .boxed()
}

/// Allocates a primary command buffer from the pool named by the key. The
/// unloader frees the buffer and then releases the pool.
pub fn command_buffer_loader<D>(loader: ResourceLoader<D>, key: CommandBufferKey) -> LoaderRoutine<CommandBuffer>
where
    D: LoaderDirectory<Context = GpuContext> + LoadsKey<CommandPoolKey>,
{
    async move {
        let pool = loader.load_resource(key.source_pool).await?;
        let device = Arc::clone(loader.context().device());

        let buffer = match device.allocate_command_buffer(pool, key.resettable) {
            Ok(buffer) => buffer,
            Err(err) => {
                if let Err(unload_err) = loader.unload_resource(&key.source_pool).await {
                    warn!("Releasing {:?} after a failed allocation: {unload_err}", key.source_pool);
                }
                return Err(err);
            }
        };

        Ok(LoaderOutcome::new(buffer).with_unloader(async move {
            device.free_command_buffer(pool, buffer);
            loader.unload_resource(&key.source_pool).await
        }))
    }
    .boxed()
}
