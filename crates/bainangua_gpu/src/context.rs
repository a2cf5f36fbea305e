use std::fmt;
use std::sync::Arc;

use crate::device::GpuDevice;
use crate::settings::GpuSettings;

/// The context value GPU loader functions receive.
///
/// Cheap to clone; the device sits behind an `Arc` so unloaders can carry it
/// without borrowing the loader.
#[derive(Clone)]
pub struct GpuContext {
    device: Arc<dyn GpuDevice>,
    graphics_queue_family: u32,
    transfer_queue_family: u32,
    settings: GpuSettings,
}

impl GpuContext {
    #[must_use]
    pub fn new(device: Arc<dyn GpuDevice>, graphics_queue_family: u32) -> Self {
        Self {
            device,
            graphics_queue_family,
            transfer_queue_family: graphics_queue_family,
            settings: GpuSettings::default(),
        }
    }

    /// Uses a dedicated transfer queue family instead of the graphics one.
    #[must_use]
    pub fn with_transfer_queue_family(mut self, family: u32) -> Self {
        self.transfer_queue_family = family;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: GpuSettings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    #[inline]
    #[must_use]
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    #[inline]
    #[must_use]
    pub fn transfer_queue_family(&self) -> u32 {
        self.transfer_queue_family
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &GpuSettings {
        &self.settings
    }
}

impl fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuContext")
            .field("graphics_queue_family", &self.graphics_queue_family)
            .field("transfer_queue_family", &self.transfer_queue_family)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
