//! Garment ingestion for upload slots.
//!
//! This module provides:
//! - Input validation for uploaded photographs
//! - The per-slot stage machine (`IngestionTask`)
//! - The `IngestionPipeline` that drives a slot through the remote calls

pub mod error;
pub mod pipeline;
pub mod source;
pub mod task;

pub use error::{IngestError, IngestResult};
pub use pipeline::IngestionPipeline;
pub use source::SourceImage;
pub use task::IngestionTask;
