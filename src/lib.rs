#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # bainangua
//!
//! Asynchronous, reference-counted resource loading for Vulkan-style
//! renderers.
//!
//! - [`errors`] and [`key`]: the error type and resource keys.
//! - [`loader`]: the typed cache, its directory macro and the loader protocol.
//! - [`gpu`]: the device abstraction and the GPU leaf loaders.
//!
//! Most programs only need the [`prelude`].

pub use bainangua_core::{errors, key};
pub use bainangua_gpu as gpu;
pub use bainangua_loader as loader;

pub use bainangua_loader::loader_directory;

pub use bainangua_core::{LoaderError, ResourceKey, Result, SingleResourceKey};
pub use bainangua_gpu::{GpuContext, GpuDevice, GpuSettings, HeadlessDevice, StagingPoolRetention};
pub use bainangua_loader::{LoaderOutcome, LoaderRoutine, ResourceLoader};

pub mod prelude {
    pub use bainangua_core::{LoaderError, ResourceKey, Result, SingleResourceKey, describe_key};
    pub use bainangua_loader::{
        LoaderDirectory, LoaderOutcome, LoaderRoutine, LoadsKey, ResourceLoader, ResourceStore,
        StoreSet, Unloader, create_loader_storage, loader_directory,
    };

    pub use bainangua_gpu::{
        Buffer, BufferUsage, CommandBuffer, CommandBufferKey, CommandPool, CommandPoolKey,
        FrameQueue, GpuContext, GpuDevice, GpuSettings, HeadlessDevice, MemoryLocation, ObjectKind,
        PerFrameData, PerFramePool, PerFramePoolKey, ShaderFileKey, ShaderModule, StagingBuffer,
        StagingBufferPool, StagingBufferPoolKey, StagingPoolRetention, UniformBufferKey,
        acquire_per_frame_data, acquire_staging_buffer, command_buffer_loader, command_pool_loader,
        per_frame_pool_loader, release_per_frame_data, release_staging_buffer,
        release_warm_staging_pool, shader_loader, staging_pool_loader, uniform_buffer_loader,
    };
}
