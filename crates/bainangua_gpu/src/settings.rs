//! GPU loader configuration.
//!
//! # Usage
//!
//! ```rust,ignore
//! let settings = GpuSettings::from_env()
//!     .with_staging_alignment(512);
//! ```

use log::warn;

/// Environment variable overriding [`GpuSettings::staging_retention`].
/// Accepts `keep-warm` or `release-when-idle`.
pub const STAGING_RETENTION_ENV: &str = "BAINANGUA_STAGING_RETENTION";
/// Environment variable overriding [`GpuSettings::staging_chunk_size`], in bytes.
pub const STAGING_CHUNK_SIZE_ENV: &str = "BAINANGUA_STAGING_CHUNK_SIZE";

/// What happens to a staging pool when its last range is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StagingPoolRetention {
    /// The first acquisition pins the pool in the cache; it stays loaded
    /// until [`release_warm_staging_pool`](crate::staging::release_warm_staging_pool).
    #[default]
    KeepWarm,
    /// The pool is torn down as soon as no range is outstanding.
    ReleaseWhenIdle,
}

impl StagingPoolRetention {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "keep-warm" | "warm" => Some(Self::KeepWarm),
            "release-when-idle" | "idle" => Some(Self::ReleaseWhenIdle),
            _ => None,
        }
    }
}

/// Tunables for the GPU leaf loaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuSettings {
    pub staging_retention: StagingPoolRetention,
    /// Minimum size of each chunk a staging pool allocates.
    pub staging_chunk_size: u64,
    /// Alignment of every staging range offset. Must be a power of two.
    pub staging_alignment: u64,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            staging_retention: StagingPoolRetention::KeepWarm,
            staging_chunk_size: 64 * 1024,
            staging_alignment: 256,
        }
    }
}

impl GpuSettings {
    #[must_use]
    pub fn with_staging_retention(mut self, retention: StagingPoolRetention) -> Self {
        self.staging_retention = retention;
        self
    }

    #[must_use]
    pub fn with_staging_chunk_size(mut self, size: u64) -> Self {
        self.staging_chunk_size = size.max(1);
        self
    }

    /// Rounds `alignment` up to a power of two.
    #[must_use]
    pub fn with_staging_alignment(mut self, alignment: u64) -> Self {
        self.staging_alignment = alignment.max(1).next_power_of_two();
        self
    }

    /// Defaults overridden by the `BAINANGUA_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(value) = lookup(STAGING_RETENTION_ENV) {
            match StagingPoolRetention::parse(&value) {
                Some(retention) => settings.staging_retention = retention,
                None => warn!("Ignoring {STAGING_RETENTION_ENV}={value:?}"),
            }
        }

        if let Some(value) = lookup(STAGING_CHUNK_SIZE_ENV) {
            match value.trim().parse::<u64>() {
                Ok(size) if size > 0 => settings.staging_chunk_size = size,
                _ => warn!("Ignoring {STAGING_CHUNK_SIZE_ENV}={value:?}"),
            }
        }

        settings
    }
}
