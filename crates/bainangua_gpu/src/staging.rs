//! Staging Buffers
//!
//! Host-visible scratch memory for uploads, sub-allocated from pooled chunks.
//!
//! # Overview
//!
//! The cache tracks one [`StagingBufferPool`] per [`BufferUsage`], keyed by
//! [`StagingBufferPoolKey`]. Individual ranges are not cache entries: every
//! range handed out by [`acquire_staging_buffer`] holds one reference to its
//! pool, and [`release_staging_buffer`] gives both back.
//!
//! What happens when the last range is released depends on
//! [`StagingPoolRetention`]. With `KeepWarm` the first successful acquisition
//! pins the pool with an extra reference, so its chunks survive idle periods
//! and the pool stays loaded until [`release_warm_staging_pool`]. With
//! `ReleaseWhenIdle` the pool is destroyed with its last range.
//!
//! # Usage
//!
//! ```rust,ignore
//! let staging = acquire_staging_buffer(&loader, BufferUsage::TransferSrc, 4096).await?;
//! staging.write(0, &vertices)?;
//! // ... record the copy ...
//! release_staging_buffer(&loader, &staging).await?;
//! ```

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bainangua_core::{LoaderError, ResourceKey, Result};
use bainangua_loader::{LoaderDirectory, LoaderOutcome, LoaderRoutine, LoadsKey, ResourceLoader};
use futures::FutureExt;
use log::{debug, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::context::GpuContext;
use crate::device::{Buffer, BufferUsage, GpuDevice, MemoryLocation};
use crate::settings::StagingPoolRetention;

/// Selects the staging pool for one buffer usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StagingBufferPoolKey {
    pub usage: BufferUsage,
}

impl ResourceKey for StagingBufferPoolKey {
    type Resource = Arc<StagingBufferPool>;
}

// ============================================================================
// Pool
// ============================================================================

#[derive(Debug)]
struct StagingChunk {
    buffer: Buffer,
    size: u64,
    /// Free ranges, sorted and non-adjacent.
    free: Vec<Range<u64>>,
    /// Offset -> reserved size.
    allocated: FxHashMap<u64, u64>,
}

impl StagingChunk {
    fn new(buffer: Buffer, size: u64) -> Self {
        Self {
            buffer,
            size,
            free: vec![0..size],
            allocated: FxHashMap::default(),
        }
    }

    /// First fit.
    fn allocate(&mut self, size: u64, alignment: u64) -> Option<u64> {
        let (index, start) = self.free.iter().enumerate().find_map(|(index, range)| {
            let start = range.start.checked_next_multiple_of(alignment)?;
            (start.checked_add(size)? <= range.end).then_some((index, start))
        })?;

        let range = self.free.remove(index);
        let end = start + size;
        let mut insert_at = index;
        if range.start < start {
            self.free.insert(insert_at, range.start..start);
            insert_at += 1;
        }
        if end < range.end {
            self.free.insert(insert_at, end..range.end);
        }
        self.allocated.insert(start, size);
        Some(start)
    }

    fn free(&mut self, offset: u64, size: u64) -> bool {
        if self.allocated.get(&offset) != Some(&size) {
            return false;
        }
        self.allocated.remove(&offset);

        let index = self.free.partition_point(|range| range.start < offset);
        let mut range = offset..offset + size;
        if self.free.get(index).is_some_and(|next| next.start == range.end) {
            range.end = self.free.remove(index).end;
        }
        if let Some(prev) = index.checked_sub(1).and_then(|prev| self.free.get_mut(prev))
            && prev.end == range.start
        {
            prev.end = range.end;
        } else {
            self.free.insert(index, range);
        }
        true
    }
}

/// Chunked host-visible memory shared by every staging range of one usage.
pub struct StagingBufferPool {
    usage: BufferUsage,
    device: Arc<dyn GpuDevice>,
    chunk_size: u64,
    alignment: u64,
    chunks: Mutex<Vec<StagingChunk>>,
    warm: AtomicBool,
}

impl StagingBufferPool {
    #[must_use]
    pub fn new(device: Arc<dyn GpuDevice>, usage: BufferUsage, chunk_size: u64, alignment: u64) -> Self {
        Self {
            usage,
            device,
            chunk_size: chunk_size.max(1),
            alignment: alignment.max(1),
            chunks: Mutex::new(Vec::new()),
            warm: AtomicBool::new(false),
        }
    }

    #[inline]
    #[must_use]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Total bytes of all chunks.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.chunks.lock().iter().map(|chunk| chunk.size).sum()
    }

    /// Bytes reserved by outstanding ranges, including alignment padding.
    #[must_use]
    pub fn allocated_bytes(&self) -> u64 {
        self.chunks
            .lock()
            .iter()
            .flat_map(|chunk| chunk.allocated.values())
            .sum()
    }

    /// Reserves `size` bytes, adding a chunk if no existing one has room.
    pub fn allocate(self: &Arc<Self>, size: u64) -> Result<StagingBuffer> {
        if size == 0 {
            return Err(LoaderError::invalid_data("zero-sized staging buffer"));
        }
        let reserved = size
            .checked_next_multiple_of(self.alignment)
            .ok_or_else(|| LoaderError::invalid_data(format!("staging size {size} overflows")))?;

        let mut chunks = self.chunks.lock();
        for chunk in chunks.iter_mut() {
            if let Some(offset) = chunk.allocate(reserved, self.alignment) {
                return Ok(self.range(chunk.buffer, offset, reserved));
            }
        }

        let chunk_size = reserved
            .checked_next_power_of_two()
            .ok_or_else(|| LoaderError::invalid_data(format!("staging size {size} has no chunk size")))?
            .max(self.chunk_size);
        let buffer = self
            .device
            .create_buffer(chunk_size, self.usage, MemoryLocation::HostVisible)?;
        let mut chunk = StagingChunk::new(buffer, chunk_size);
        let Some(offset) = chunk.allocate(reserved, self.alignment) else {
            self.device.destroy_buffer(buffer);
            return Err(LoaderError::device("new staging chunk is too small"));
        };
        debug!(
            "Staging pool {:?} grew by {chunk_size} bytes ({} chunks)",
            self.usage,
            chunks.len() + 1
        );
        chunks.push(chunk);
        Ok(self.range(buffer, offset, reserved))
    }

    fn range(self: &Arc<Self>, buffer: Buffer, offset: u64, size: u64) -> StagingBuffer {
        StagingBuffer {
            pool: Arc::clone(self),
            buffer,
            offset,
            size,
        }
    }

    /// Returns a range to its chunk.
    pub fn free(&self, buffer: Buffer, offset: u64, size: u64) -> Result<()> {
        let mut chunks = self.chunks.lock();
        let freed = chunks
            .iter_mut()
            .find(|chunk| chunk.buffer == buffer)
            .is_some_and(|chunk| chunk.free(offset, size));
        if freed {
            Ok(())
        } else {
            Err(LoaderError::invalid_data(format!(
                "staging range {buffer:?}+{offset} ({size} bytes) is not allocated"
            )))
        }
    }

    /// Destroys every chunk. Outstanding ranges become invalid.
    pub fn destroy(&self) {
        let chunks = std::mem::take(&mut *self.chunks.lock());
        for chunk in chunks {
            if !chunk.allocated.is_empty() {
                warn!(
                    "Staging pool {:?}: destroying {:?} with {} ranges outstanding",
                    self.usage,
                    chunk.buffer,
                    chunk.allocated.len()
                );
            }
            self.device.destroy_buffer(chunk.buffer);
        }
    }

    /// Marks the pool as pinned. Returns `true` for the caller that set it.
    pub fn pin_warm(&self) -> bool {
        self.warm
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clears the pin. Returns `true` for the caller that cleared it.
    pub fn unpin_warm(&self) -> bool {
        self.warm
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.warm.load(Ordering::Acquire)
    }
}

impl fmt::Debug for StagingBufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingBufferPool")
            .field("usage", &self.usage)
            .field("chunk_count", &self.chunk_count())
            .field("allocated_bytes", &self.allocated_bytes())
            .field("warm", &self.is_warm())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Ranges
// ============================================================================

/// One range of a staging pool.
#[derive(Clone)]
pub struct StagingBuffer {
    pool: Arc<StagingBufferPool>,
    buffer: Buffer,
    offset: u64,
    size: u64,
}

impl StagingBuffer {
    #[inline]
    #[must_use]
    pub fn usage(&self) -> BufferUsage {
        self.pool.usage
    }

    /// The chunk buffer the range lives in.
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> Buffer {
        self.buffer
    }

    #[inline]
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reserved size, rounded up to the pool alignment.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    #[must_use]
    pub fn pool(&self) -> &Arc<StagingBufferPool> {
        &self.pool
    }

    /// Copies `data` into the range at `offset`.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let len = u64::try_from(data.len()).unwrap_or(u64::MAX);
        if offset.checked_add(len).is_none_or(|end| end > self.size) {
            return Err(LoaderError::invalid_data(format!(
                "write of {len} bytes at {offset} exceeds staging range of {} bytes",
                self.size
            )));
        }
        self.pool
            .device
            .write_buffer(self.buffer, self.offset + offset, data)
    }
}

impl fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("usage", &self.pool.usage)
            .field("buffer", &self.buffer)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}

// ============================================================================
// Loader and helpers
// ============================================================================

/// Creates an empty pool sized by the context settings. The unloader destroys
/// its chunks.
pub fn staging_pool_loader<D>(
    loader: ResourceLoader<D>,
    key: StagingBufferPoolKey,
) -> LoaderRoutine<Arc<StagingBufferPool>>
where
    D: LoaderDirectory<Context = GpuContext>,
{
    async move {
        let context = loader.context();
        let pool = Arc::new(StagingBufferPool::new(
            Arc::clone(context.device()),
            key.usage,
            context.settings().staging_chunk_size,
            context.settings().staging_alignment,
        ));
        debug!("Created staging pool for {:?}", key.usage);

        let teardown = Arc::clone(&pool);
        Ok(LoaderOutcome::new(pool).with_unloader(async move {
            teardown.destroy();
            Ok(())
        }))
    }
    .boxed()
}

/// Reserves `size` bytes of staging memory for `usage`.
///
/// Each call takes one reference to the pool; balance it with
/// [`release_staging_buffer`]. Under `KeepWarm` the first successful
/// acquisition also takes the retention pin's reference.
pub async fn acquire_staging_buffer<D>(
    loader: &ResourceLoader<D>,
    usage: BufferUsage,
    size: u64,
) -> Result<StagingBuffer>
where
    D: LoaderDirectory<Context = GpuContext> + LoadsKey<StagingBufferPoolKey>,
{
    let key = StagingBufferPoolKey { usage };
    let pool = loader.load_resource(key).await?;

    let staging = match pool.allocate(size) {
        Ok(staging) => staging,
        Err(err) => {
            release_pool_reference(loader, key).await;
            return Err(err);
        }
    };

    if loader.context().settings().staging_retention == StagingPoolRetention::KeepWarm && !pool.is_warm() {
        pin_pool(loader, &pool).await;
    }
    Ok(staging)
}

/// Takes the pin's reference, then publishes the pin. A concurrent
/// [`release_warm_staging_pool`] only sees `warm` once the reference it drops
/// exists.
async fn pin_pool<D>(loader: &ResourceLoader<D>, pool: &StagingBufferPool)
where
    D: LoaderDirectory<Context = GpuContext> + LoadsKey<StagingBufferPoolKey>,
{
    let key = StagingBufferPoolKey { usage: pool.usage };
    match loader.load_resource(key).await {
        Ok(_) if pool.pin_warm() => debug!("Pinned staging pool for {:?}", pool.usage),
        Ok(_) => release_pool_reference(loader, key).await,
        Err(err) => warn!("Pinning {key:?}: {err}"),
    }
}

/// Returns a range to its pool and drops the reference it held.
pub async fn release_staging_buffer<D>(loader: &ResourceLoader<D>, staging: &StagingBuffer) -> Result<()>
where
    D: LoaderDirectory<Context = GpuContext> + LoadsKey<StagingBufferPoolKey>,
{
    staging
        .pool
        .free(staging.buffer, staging.offset, staging.size)?;
    loader
        .unload_resource(&StagingBufferPoolKey {
            usage: staging.usage(),
        })
        .await
}

/// Drops the retention pin of a warm pool so it is destroyed once idle.
///
/// Returns `false` if the pool is not loaded or not pinned.
pub async fn release_warm_staging_pool<D>(loader: &ResourceLoader<D>, usage: BufferUsage) -> Result<bool>
where
    D: LoaderDirectory<Context = GpuContext> + LoadsKey<StagingBufferPoolKey>,
{
    let key = StagingBufferPoolKey { usage };
    match loader.peek_resource(&key).await {
        Some(pool) if pool.unpin_warm() => {
            loader.unload_resource(&key).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

async fn release_pool_reference<D>(loader: &ResourceLoader<D>, key: StagingBufferPoolKey)
where
    D: LoaderDirectory<Context = GpuContext> + LoadsKey<StagingBufferPoolKey>,
{
    if let Err(err) = loader.unload_resource(&key).await {
        warn!("Releasing {key:?}: {err}");
    }
}
