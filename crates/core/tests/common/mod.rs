//! Common test utilities shared by the integration tests.
//!
//! This module provides:
//! - Fixtures (sample photos, candidate regions, wired-up pipelines)
//! - Event assertions
//! - Helpers for waiting on held mock calls

pub mod assertions;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
