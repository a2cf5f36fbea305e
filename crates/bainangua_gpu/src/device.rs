//! Graphics Device Abstraction
//!
//! The loaders never talk to a graphics API directly. They see the device as
//! an opaque [`GpuDevice`] object that creates and destroys handles, which
//! keeps the cache testable without a GPU.

use std::fmt;

use bainangua_core::Result;

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

macro_rules! define_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(u64);

            impl $name {
                #[inline]
                #[must_use]
                pub const fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                #[inline]
                #[must_use]
                pub const fn raw(self) -> u64 {
                    self.0
                }
            }

            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, concat!(stringify!($name), "({:#x})"), self.0)
                }
            }
        )*
    };
}

define_handle! {
    /// A compiled shader module.
    ShaderModule,
    /// A command pool bound to one queue family.
    CommandPool,
    /// A primary command buffer allocated from a [`CommandPool`].
    CommandBuffer,
    /// A buffer object and its backing memory.
    Buffer,
}

/// What a buffer is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    TransferSrc,
}

/// Where a buffer's memory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Mappable by the CPU.
    HostVisible,
    DeviceLocal,
}

/// The subset of a graphics device the leaf loaders use.
///
/// Implementations must be thread-safe; loaders call them from whichever
/// runtime worker polls the load.
pub trait GpuDevice: Send + Sync {
    /// Creates a shader module from SPIR-V words.
    fn create_shader_module(&self, code: &[u32]) -> Result<ShaderModule>;
    fn destroy_shader_module(&self, module: ShaderModule);

    /// Creates a command pool on `queue_family`. Transient pools hint
    /// short-lived buffers.
    fn create_command_pool(&self, queue_family: u32, transient: bool) -> Result<CommandPool>;
    fn destroy_command_pool(&self, pool: CommandPool);

    fn allocate_command_buffer(&self, pool: CommandPool, resettable: bool) -> Result<CommandBuffer>;
    fn free_command_buffer(&self, pool: CommandPool, buffer: CommandBuffer);

    fn create_buffer(&self, size: u64, usage: BufferUsage, location: MemoryLocation) -> Result<Buffer>;
    fn destroy_buffer(&self, buffer: Buffer);

    /// Copies `data` into a host-visible buffer at `offset`.
    fn write_buffer(&self, buffer: Buffer, offset: u64, data: &[u8]) -> Result<()>;
}
