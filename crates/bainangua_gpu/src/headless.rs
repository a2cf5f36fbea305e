//! Headless Device
//!
//! A software [`GpuDevice`] that hands out unique handles and records what is
//! alive. Tests and the demo app use it to prove that every object a loader
//! creates is destroyed by the matching unloader.
//!
//! # Usage
//!
//! ```rust,ignore
//! let device = Arc::new(HeadlessDevice::new());
//! device.fail_next(ObjectKind::CommandBuffer);
//! // ... run loads ...
//! assert_eq!(device.live_object_count(), 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use bainangua_core::{LoaderError, Result};
use log::{trace, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::device::{
    Buffer, BufferUsage, CommandBuffer, CommandPool, GpuDevice, MemoryLocation, SPIRV_MAGIC,
    ShaderModule,
};

/// Kinds of object a [`HeadlessDevice`] tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    ShaderModule,
    CommandPool,
    CommandBuffer,
    Buffer,
}

#[derive(Debug)]
enum LiveObject {
    ShaderModule,
    CommandPool { queue_family: u32 },
    CommandBuffer { pool: u64 },
    Buffer { location: MemoryLocation, contents: Vec<u8> },
}

impl LiveObject {
    fn kind(&self) -> ObjectKind {
        match self {
            Self::ShaderModule => ObjectKind::ShaderModule,
            Self::CommandPool { .. } => ObjectKind::CommandPool,
            Self::CommandBuffer { .. } => ObjectKind::CommandBuffer,
            Self::Buffer { .. } => ObjectKind::Buffer,
        }
    }
}

/// A device without a GPU behind it.
#[derive(Debug)]
pub struct HeadlessDevice {
    next_handle: AtomicU64,
    live: Mutex<FxHashMap<u64, LiveObject>>,
    pending_failures: Mutex<Vec<ObjectKind>>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            live: Mutex::new(FxHashMap::default()),
            pending_failures: Mutex::new(Vec::new()),
        }
    }

    /// Number of objects created and not yet destroyed.
    #[must_use]
    pub fn live_object_count(&self) -> usize {
        self.live.lock().len()
    }

    #[must_use]
    pub fn live_count(&self, kind: ObjectKind) -> usize {
        self.live.lock().values().filter(|object| object.kind() == kind).count()
    }

    /// Makes the next creation of `kind` fail with a device error.
    /// Calls accumulate.
    pub fn fail_next(&self, kind: ObjectKind) {
        self.pending_failures.lock().push(kind);
    }

    /// Reads back the contents of a host-visible buffer.
    #[must_use]
    pub fn read_buffer(&self, buffer: Buffer, offset: u64, len: usize) -> Option<Vec<u8>> {
        let live = self.live.lock();
        let LiveObject::Buffer { contents, .. } = live.get(&buffer.raw())? else {
            return None;
        };
        let start = usize::try_from(offset).ok()?;
        contents.get(start..start.checked_add(len)?).map(<[u8]>::to_vec)
    }

    /// Queue family of the pool a live command buffer was allocated from.
    #[must_use]
    pub fn command_buffer_queue_family(&self, buffer: CommandBuffer) -> Option<u32> {
        let live = self.live.lock();
        let LiveObject::CommandBuffer { pool } = live.get(&buffer.raw())? else {
            return None;
        };
        match live.get(pool)? {
            LiveObject::CommandPool { queue_family } => Some(*queue_family),
            _ => None,
        }
    }

    fn take_failure(&self, kind: ObjectKind) -> Result<()> {
        let mut pending = self.pending_failures.lock();
        if let Some(index) = pending.iter().position(|pending| *pending == kind) {
            pending.remove(index);
            return Err(LoaderError::device(format!("injected {kind:?} creation failure")));
        }
        Ok(())
    }

    fn insert(&self, object: LiveObject) -> Result<u64> {
        self.take_failure(object.kind())?;
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        trace!("HeadlessDevice: create {:?} {handle:#x}", object.kind());
        self.live.lock().insert(handle, object);
        Ok(handle)
    }

    fn destroy(&self, handle: u64, expected: ObjectKind) {
        let mut live = self.live.lock();
        match live.get(&handle).map(LiveObject::kind) {
            Some(kind) if kind == expected => {
                live.remove(&handle);
                trace!("HeadlessDevice: destroy {kind:?} {handle:#x}");
            }
            Some(kind) => warn!("HeadlessDevice: {handle:#x} is a {kind:?}, not a {expected:?}"),
            None => warn!("HeadlessDevice: destroy of unknown {expected:?} {handle:#x}"),
        }
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_shader_module(&self, code: &[u32]) -> Result<ShaderModule> {
        match code.first() {
            None => return Err(LoaderError::invalid_data("empty SPIR-V module")),
            Some(&word) if word != SPIRV_MAGIC => {
                return Err(LoaderError::invalid_data(format!(
                    "bad SPIR-V magic {word:#010x}"
                )));
            }
            Some(_) => {}
        }
        self.insert(LiveObject::ShaderModule).map(ShaderModule::from_raw)
    }

    fn destroy_shader_module(&self, module: ShaderModule) {
        self.destroy(module.raw(), ObjectKind::ShaderModule);
    }

    fn create_command_pool(&self, queue_family: u32, _transient: bool) -> Result<CommandPool> {
        self.insert(LiveObject::CommandPool { queue_family })
            .map(CommandPool::from_raw)
    }

    fn destroy_command_pool(&self, pool: CommandPool) {
        let mut live = self.live.lock();
        let orphans: Vec<u64> = live
            .iter()
            .filter_map(|(handle, object)| match object {
                LiveObject::CommandBuffer { pool: owner } if *owner == pool.raw() => Some(*handle),
                _ => None,
            })
            .collect();
        if !orphans.is_empty() {
            warn!(
                "HeadlessDevice: {pool:?} destroyed with {} command buffers still allocated",
                orphans.len()
            );
            for handle in orphans {
                live.remove(&handle);
            }
        }
        drop(live);
        self.destroy(pool.raw(), ObjectKind::CommandPool);
    }

    fn allocate_command_buffer(&self, pool: CommandPool, _resettable: bool) -> Result<CommandBuffer> {
        if self.live.lock().get(&pool.raw()).map(LiveObject::kind) != Some(ObjectKind::CommandPool) {
            return Err(LoaderError::device(format!("{pool:?} is not a live command pool")));
        }
        self.insert(LiveObject::CommandBuffer { pool: pool.raw() })
            .map(CommandBuffer::from_raw)
    }

    fn free_command_buffer(&self, _pool: CommandPool, buffer: CommandBuffer) {
        self.destroy(buffer.raw(), ObjectKind::CommandBuffer);
    }

    fn create_buffer(&self, size: u64, _usage: BufferUsage, location: MemoryLocation) -> Result<Buffer> {
        if size == 0 {
            return Err(LoaderError::device("zero-sized buffer"));
        }
        let len = usize::try_from(size)
            .map_err(|_| LoaderError::device(format!("buffer of {size} bytes is too large")))?;
        let contents = match location {
            MemoryLocation::HostVisible => vec![0; len],
            MemoryLocation::DeviceLocal => Vec::new(),
        };
        self.insert(LiveObject::Buffer { location, contents })
            .map(Buffer::from_raw)
    }

    fn destroy_buffer(&self, buffer: Buffer) {
        self.destroy(buffer.raw(), ObjectKind::Buffer);
    }

    fn write_buffer(&self, buffer: Buffer, offset: u64, data: &[u8]) -> Result<()> {
        let mut live = self.live.lock();
        let Some(LiveObject::Buffer { location, contents }) = live.get_mut(&buffer.raw()) else {
            return Err(LoaderError::device(format!("{buffer:?} is not a live buffer")));
        };
        if *location != MemoryLocation::HostVisible {
            return Err(LoaderError::device(format!("{buffer:?} is not host visible")));
        }
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(data.len())?))
            .filter(|range| range.end <= contents.len())
            .ok_or_else(|| LoaderError::device(format!("write out of bounds of {buffer:?}")))?;
        contents[range].copy_from_slice(data);
        Ok(())
    }
}
