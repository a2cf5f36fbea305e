//! Error Types
//!
//! This module defines the error type returned by every resource loader operation.
//!
//! # Overview
//!
//! [`LoaderError`] covers two layers:
//! - Cache-level failures reported by the resource loader itself
//!   (`LoadFailure`, `DependencyLoadFailure`, `UnloadFailure`, `DoubleUnload`).
//! - Leaf causes raised inside loader functions (`Device`, `Io`,
//!   `InvalidData`, `Message`, `Panicked`), which the cache wraps instead of
//!   swallowing.
//!
//! The type is `Clone` because every requester waiting on the same in-flight
//! load receives the same failure.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bainangua_core::errors::{LoaderError, Result};
//!
//! fn check(code: &[u32]) -> Result<()> {
//!     if code.is_empty() {
//!         return Err(LoaderError::invalid_data("empty shader"));
//!     }
//!     Ok(())
//! }
//! ```

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// The error type of the resource loader and its leaf loaders.
#[derive(Error, Debug, Clone)]
pub enum LoaderError {
    // ========================================================================
    // Cache-level failures
    // ========================================================================
    /// The loader function for `key` reported a failure.
    #[error("failed to load {key}: {source}")]
    LoadFailure {
        /// Description of the key whose load failed
        key: String,
        /// The error reported by the loader function
        source: Arc<LoaderError>,
    },

    /// A dependency requested by the loader function for `key` failed to load.
    #[error("dependency of {key} failed to load: {source}")]
    DependencyLoadFailure {
        /// Description of the key whose loader requested the dependency
        key: String,
        /// The failure of the dependency load
        source: Arc<LoaderError>,
    },

    /// The unloader for `key` failed. The cache entry has been removed anyway.
    #[error("failed to unload {key}: {source}")]
    UnloadFailure {
        /// Description of the key whose teardown failed
        key: String,
        /// The error reported by the unloader
        source: Arc<LoaderError>,
    },

    /// `unload_resource` was called for a key that holds no references.
    #[error("unload of {key} without a matching load")]
    DoubleUnload {
        /// Description of the key
        key: String,
    },

    // ========================================================================
    // Leaf causes
    // ========================================================================
    /// A loader or unloader panicked.
    #[error("loader panicked: {message}")]
    Panicked {
        /// The panic payload, when it was a string
        message: String,
    },

    /// The graphics device rejected a request.
    #[error("device error: {0}")]
    Device(String),

    /// File I/O failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file that was being read
        path: PathBuf,
        /// The underlying I/O error
        source: Arc<std::io::Error>,
    },

    /// Input data is malformed.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Free-form failure raised by a loader.
    #[error("{0}")]
    Message(String),
}

impl LoaderError {
    #[must_use]
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device(message.into())
    }

    #[must_use]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Converts a caught panic payload into an error.
    #[must_use]
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Wraps the failure of the loader function for `key`.
    ///
    /// A failure that is itself a cache-level load failure came from a
    /// recursive `load_resource` call and is reported as a dependency failure.
    #[must_use]
    pub fn load_failed(key: String, source: LoaderError) -> Self {
        if source.is_load_failure() {
            Self::DependencyLoadFailure {
                key,
                source: Arc::new(source),
            }
        } else {
            Self::LoadFailure {
                key,
                source: Arc::new(source),
            }
        }
    }

    #[must_use]
    pub fn unload_failed(key: String, source: LoaderError) -> Self {
        Self::UnloadFailure {
            key,
            source: Arc::new(source),
        }
    }

    /// Returns `true` for `LoadFailure` and `DependencyLoadFailure`.
    #[inline]
    #[must_use]
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::LoadFailure { .. } | Self::DependencyLoadFailure { .. }
        )
    }

    /// Follows the wrapped sources down to the leaf cause.
    #[must_use]
    pub fn root_cause(&self) -> &LoaderError {
        match self {
            Self::LoadFailure { source, .. }
            | Self::DependencyLoadFailure { source, .. }
            | Self::UnloadFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Alias for `Result<T, LoaderError>`.
pub type Result<T> = std::result::Result<T, LoaderError>;
