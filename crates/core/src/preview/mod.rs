//! Preview generation registry.
//!
//! This module provides:
//! - `PreviewRegistry` for running keyed, deduplicated generation calls
//! - `PreviewPromptSource` and `PromptTable` for building request payloads

pub mod prompts;
pub mod registry;

pub use prompts::{PreviewPromptSource, PromptTable};
pub use registry::{PreviewRegistry, PreviewTicket};
