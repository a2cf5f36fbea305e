//! Per-Frame Pools
//!
//! A fixed ring of frames in flight, each owning one command buffer.
//!
//! # Overview
//!
//! The cache tracks one [`PerFramePool`] per [`PerFramePoolKey`]. Loading the
//! pool loads a [`CommandBufferKey`] for every frame, so the pool, its command
//! buffers and their command pool all live in the cache and unwind together.
//!
//! Frames are not cache entries. Like staging ranges, every frame handed out
//! by [`acquire_per_frame_data`] holds one reference to its pool and
//! [`release_per_frame_data`] gives it back. A renderer normally holds its own
//! reference to the pool for its whole lifetime so that releasing the last
//! frame in flight does not tear the pool down.
//!
//! The pool's command buffers use indices `0..frames_in_flight` of its command
//! pool; other [`CommandBufferKey`]s on the same pool should pick different
//! indices.
//!
//! # Usage
//!
//! ```rust,ignore
//! let key = PerFramePoolKey::graphics(3);
//! loader.load_resource(key).await?;
//!
//! let frame = acquire_per_frame_data(&loader, key).await?;
//! record(frame.command_buffer());
//! release_per_frame_data(&loader, &frame).await?;
//!
//! loader.unload_resource(&key).await?;
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use bainangua_core::{LoaderError, ResourceKey, Result};
use bainangua_loader::{LoaderDirectory, LoaderOutcome, LoaderRoutine, LoadsKey, ResourceLoader};
use futures::FutureExt;
use futures::future::join_all;
use log::{debug, warn};
use parking_lot::Mutex;

use crate::command::{CommandBufferKey, CommandPoolKey};
use crate::context::GpuContext;
use crate::device::CommandBuffer;

/// The queue a per-frame pool records for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameQueue {
    /// Draw recording on the graphics queue family, from a `MainDraw` pool.
    Graphics,
    /// Upload recording on the transfer queue family, from a `Transient` pool.
    Transfer,
}

/// Identifies a per-frame pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PerFramePoolKey {
    pub queue: FrameQueue,
    pub frames_in_flight: u32,
}

impl PerFramePoolKey {
    #[must_use]
    pub fn graphics(frames_in_flight: u32) -> Self {
        Self {
            queue: FrameQueue::Graphics,
            frames_in_flight,
        }
    }

    #[must_use]
    pub fn transfer(frames_in_flight: u32) -> Self {
        Self {
            queue: FrameQueue::Transfer,
            frames_in_flight,
        }
    }

    /// The command pool the frames allocate from.
    #[must_use]
    pub fn command_pool(self, context: &GpuContext) -> CommandPoolKey {
        match self.queue {
            FrameQueue::Graphics => CommandPoolKey::MainDraw {
                queue_family: context.graphics_queue_family(),
            },
            FrameQueue::Transfer => CommandPoolKey::Transient {
                queue_family: context.transfer_queue_family(),
            },
        }
    }
}

impl ResourceKey for PerFramePoolKey {
    type Resource = Arc<PerFramePool>;
}

// ============================================================================
// Pool
// ============================================================================

#[derive(Debug)]
struct FrameSlots {
    /// Oldest-released first.
    free: VecDeque<u32>,
    in_flight: Vec<bool>,
}

/// A ring of frames, each with its own command buffer.
pub struct PerFramePool {
    key: PerFramePoolKey,
    command_buffers: Vec<CommandBuffer>,
    slots: Mutex<FrameSlots>,
}

impl PerFramePool {
    fn new(key: PerFramePoolKey, command_buffers: Vec<CommandBuffer>) -> Self {
        let frames = command_buffers.len();
        Self {
            key,
            slots: Mutex::new(FrameSlots {
                free: (0..key.frames_in_flight).collect(),
                in_flight: vec![false; frames],
            }),
            command_buffers,
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> PerFramePoolKey {
        self.key
    }

    #[must_use]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.lock().in_flight.iter().filter(|busy| **busy).count()
    }

    /// Hands out the frame released longest ago, or `None` if every frame is
    /// in flight.
    pub fn acquire(self: &Arc<Self>) -> Option<PerFrameData> {
        let mut slots = self.slots.lock();
        let index = slots.free.pop_front()?;
        let position = index as usize;
        slots.in_flight[position] = true;
        Some(PerFrameData {
            pool: Arc::clone(self),
            index,
            command_buffer: self.command_buffers[position],
        })
    }

    /// Returns a frame to the ring.
    pub fn release(&self, index: u32) -> Result<()> {
        let mut guard = self.slots.lock();
        let slots = &mut *guard;
        match slots.in_flight.get_mut(index as usize) {
            Some(busy) if *busy => {
                *busy = false;
                slots.free.push_back(index);
                Ok(())
            }
            _ => Err(LoaderError::invalid_data(format!(
                "frame {index} of {:?} is not in flight",
                self.key
            ))),
        }
    }
}

impl fmt::Debug for PerFramePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerFramePool")
            .field("key", &self.key)
            .field("frames_in_flight", &self.frames_in_flight())
            .finish_non_exhaustive()
    }
}

/// One frame handed out by a [`PerFramePool`].
#[derive(Clone)]
pub struct PerFrameData {
    pool: Arc<PerFramePool>,
    index: u32,
    command_buffer: CommandBuffer,
}

impl PerFrameData {
    #[inline]
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The command buffer this frame records into.
    #[inline]
    #[must_use]
    pub fn command_buffer(&self) -> CommandBuffer {
        self.command_buffer
    }

    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Arc<PerFramePool> {
        &self.pool
    }
}

impl fmt::Debug for PerFrameData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerFrameData")
            .field("pool", &self.pool.key)
            .field("index", &self.index)
            .field("command_buffer", &self.command_buffer)
            .finish()
    }
}

// ============================================================================
// Loader and helpers
// ============================================================================

/// Loads one command buffer per frame. The unloader releases them all.
pub fn per_frame_pool_loader<D>(loader: ResourceLoader<D>, key: PerFramePoolKey) -> LoaderRoutine<Arc<PerFramePool>>
where
    D: LoaderDirectory<Context = GpuContext> + LoadsKey<CommandBufferKey>,
{
    async move {
        if key.frames_in_flight == 0 {
            return Err(LoaderError::invalid_data(format!("{key:?} has no frames")));
        }
        let source_pool = key.command_pool(loader.context());
        let buffer_keys: Vec<CommandBufferKey> = (0..key.frames_in_flight)
            .map(|index| CommandBufferKey {
                source_pool,
                resettable: true,
                index,
            })
            .collect();

        let mut command_buffers = Vec::with_capacity(buffer_keys.len());
        for buffer_key in &buffer_keys {
            match loader.load_resource(*buffer_key).await {
                Ok(buffer) => command_buffers.push(buffer),
                Err(err) => {
                    for loaded in buffer_keys[..command_buffers.len()].iter().rev() {
                        if let Err(unload_err) = loader.unload_resource(loaded).await {
                            warn!("Releasing {loaded:?} after a failed frame load: {unload_err}");
                        }
                    }
                    return Err(err);
                }
            }
        }

        let pool = Arc::new(PerFramePool::new(key, command_buffers));
        debug!("Created per-frame pool {key:?} on {source_pool:?}");

        let teardown = Arc::clone(&pool);
        Ok(LoaderOutcome::new(pool).with_unloader(async move {
            let in_flight = teardown.frames_in_flight();
            if in_flight > 0 {
                warn!("Destroying {key:?} with {in_flight} frames in flight");
            }
            join_all(buffer_keys.iter().map(|buffer_key| loader.unload_resource(buffer_key)))
                .await
                .into_iter()
                .collect::<Result<()>>()
        }))
    }
    .boxed()
}

/// Hands out the next free frame of the pool named by `key`.
///
/// Each frame takes one reference to the pool; balance it with
/// [`release_per_frame_data`]. Fails if every frame is in flight.
pub async fn acquire_per_frame_data<D>(loader: &ResourceLoader<D>, key: PerFramePoolKey) -> Result<PerFrameData>
where
    D: LoaderDirectory<Context = GpuContext> + LoadsKey<PerFramePoolKey>,
{
    let pool = loader.load_resource(key).await?;
    if let Some(frame) = pool.acquire() {
        return Ok(frame);
    }

    if let Err(err) = loader.unload_resource(&key).await {
        warn!("Releasing {key:?}: {err}");
    }
    Err(LoaderError::invalid_data(format!(
        "all {} frames of {key:?} are in flight",
        key.frames_in_flight
    )))
}

/// Returns a frame to its pool and drops the reference it held.
pub async fn release_per_frame_data<D>(loader: &ResourceLoader<D>, frame: &PerFrameData) -> Result<()>
where
    D: LoaderDirectory<Context = GpuContext> + LoadsKey<PerFramePoolKey>,
{
    frame.pool.release(frame.index)?;
    loader.unload_resource(&frame.pool.key).await
}
