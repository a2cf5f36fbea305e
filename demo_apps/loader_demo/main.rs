//! Drives the GPU loaders against a headless device and reports what the cache
//! holds at each step.
//!
//! Run with `RUST_LOG=debug` to see every load and teardown, and with
//! `BAINANGUA_STAGING_RETENTION=release-when-idle` to watch the staging pool go
//! away with its last range.

use std::sync::Arc;

use bainangua::gpu::SPIRV_MAGIC;
use bainangua::prelude::*;
use log::info;

loader_directory! {
    /// Every GPU loader this demo uses.
    struct DemoLoaders {
        context: GpuContext,
        stores: DemoStores,
        shaders: ShaderFileKey => shader_loader,
        command_pools: CommandPoolKey => command_pool_loader,
        command_buffers: CommandBufferKey => command_buffer_loader,
        staging_pools: StagingBufferPoolKey => staging_pool_loader,
        frame_pools: PerFramePoolKey => per_frame_pool_loader,
        uniforms: UniformBufferKey => uniform_buffer_loader,
    }
}

const FRAMES_IN_FLIGHT: u32 = 3;
const TRANSFER_QUEUE_FAMILY: u32 = 1;

fn triangle_spirv() -> Vec<u8> {
    [SPIRV_MAGIC, 0x0001_0600, 0, 8, 0]
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let device = Arc::new(HeadlessDevice::new());
    let settings = GpuSettings::from_env();
    info!("Settings: {settings:?}");
    let context = GpuContext::new(device.clone(), 0)
        .with_transfer_queue_family(TRANSFER_QUEUE_FAMILY)
        .with_settings(settings);
    let loader = ResourceLoader::new(context, DemoLoaders);

    // Shader
    let shader_path = std::env::temp_dir().join("bainangua_demo_triangle.spv");
    tokio::fs::write(&shader_path, triangle_spirv()).await?;
    let shader_key = ShaderFileKey::new(&shader_path);
    let module = loader.load_resource(shader_key.clone()).await?;
    info!("Loaded {module:?}; cache holds {} entries", loader.measure_load());

    // Frames in flight, each with its own command buffer from one shared pool
    let frames_key = PerFramePoolKey::graphics(FRAMES_IN_FLIGHT);
    loader.load_resource(frames_key).await?;
    info!("Loaded {frames_key:?}; cache holds {} entries", loader.measure_load());
    for _ in 0..FRAMES_IN_FLIGHT * 2 {
        let frame = acquire_per_frame_data(&loader, frames_key).await?;
        info!("Recording frame {} into {:?}", frame.index(), frame.command_buffer());
        release_per_frame_data(&loader, &frame).await?;
    }

    // One uniform buffer per frame, loaded concurrently
    let uniform_keys: Vec<UniformBufferKey> = (0..FRAMES_IN_FLIGHT)
        .map(|slot| UniformBufferKey { size: 256, slot })
        .collect();
    futures::future::try_join_all(uniform_keys.iter().map(|key| loader.load_resource(*key))).await?;

    // Upload through staging memory
    let staging = acquire_staging_buffer(&loader, BufferUsage::TransferSrc, 4096).await?;
    staging.write(0, &[0xab; 64])?;
    info!("Staging range {staging:?}");
    let upload = acquire_per_frame_data(&loader, PerFramePoolKey::transfer(1)).await?;
    info!("Recording the copy into {:?}", upload.command_buffer());
    release_per_frame_data(&loader, &upload).await?;
    release_staging_buffer(&loader, &staging).await?;

    // Teardown
    loader.unload_resource(&frames_key).await?;
    for key in &uniform_keys {
        loader.unload_resource(key).await?;
    }
    loader.unload_resource(&shader_key).await?;
    info!(
        "After teardown: {} entries {:?}",
        loader.measure_load(),
        loader.outstanding()
    );

    if release_warm_staging_pool(&loader, BufferUsage::TransferSrc).await? {
        info!("Released the warm staging pool");
    }
    info!(
        "Final: {} cache entries, {} live device objects",
        loader.measure_load(),
        device.live_object_count()
    );

    tokio::fs::remove_file(&shader_path).await?;
    Ok(())
}
