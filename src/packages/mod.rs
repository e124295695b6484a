//! # Package manager abstraction
//!
//! [`PackageManager`] is the capability set every backend implements:
//! detect, list, install, remove and query. [`BackendRegistry`] maps
//! backend names to adapters and serializes mutations per backend.

pub mod registry;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use registry::BackendRegistry;
pub use traits::{PackageManager, Presence};
