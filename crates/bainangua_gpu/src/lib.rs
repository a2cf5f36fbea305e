//! GPU leaf loaders for the bainangua resource loader.
//!
//! The loaders are generic over any loader directory whose context is a
//! [`GpuContext`], so an application can mix them with its own key types in a
//! single [`loader_directory!`](bainangua_loader::loader_directory) invocation:
//!
//! ```rust,ignore
//! bainangua_loader::loader_directory! {
//!     pub struct RenderLoaders {
//!         context: GpuContext,
//!         stores: RenderStores,
//!         shaders: ShaderFileKey => shader_loader,
//!         command_pools: CommandPoolKey => command_pool_loader,
//!         command_buffers: CommandBufferKey => command_buffer_loader,
//!         staging_pools: StagingBufferPoolKey => staging_pool_loader,
//!         frame_pools: PerFramePoolKey => per_frame_pool_loader,
//!         uniforms: UniformBufferKey => uniform_buffer_loader,
//!     }
//! }
//! ```

pub mod command;
pub mod context;
pub mod device;
pub mod frame;
pub mod headless;
pub mod settings;
pub mod shader;
pub mod staging;
pub mod uniform;

pub use command::{CommandBufferKey, CommandPoolKey, command_buffer_loader, command_pool_loader};
pub use context::GpuContext;
pub use device::{
    Buffer, BufferUsage, CommandBuffer, CommandPool, GpuDevice, MemoryLocation, SPIRV_MAGIC,
    ShaderModule,
};
pub use frame::{
    FrameQueue, PerFrameData, PerFramePool, PerFramePoolKey, acquire_per_frame_data,
    per_frame_pool_loader, release_per_frame_data,
};
pub use headless::{HeadlessDevice, ObjectKind};
pub use settings::{GpuSettings, StagingPoolRetention};
pub use shader::{ShaderFileKey, shader_loader};
pub use staging::{
    StagingBuffer, StagingBufferPool, StagingBufferPoolKey, acquire_staging_buffer,
    release_staging_buffer, release_warm_staging_pool, staging_pool_loader,
};
pub use uniform::{UniformBufferKey, uniform_buffer_loader};
