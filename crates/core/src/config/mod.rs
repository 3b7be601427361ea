//! Configuration loading.
//!
//! This module loads and validates `.studio/config.toml`.

pub mod error;
pub mod loader;
