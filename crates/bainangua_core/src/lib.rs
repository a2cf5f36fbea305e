//! Core types shared by every bainangua crate.
//!
//! - [`errors`]: the [`LoaderError`] taxonomy and the crate-wide [`Result`] alias.
//! - [`key`]: the [`ResourceKey`] trait that ties a lookup value to the
//!   resource type it produces, plus the generic [`SingleResourceKey`].

pub mod errors;
pub mod key;

pub use errors::{LoaderError, Result};
pub use key::{ResourceKey, SingleResourceKey, describe_key};
