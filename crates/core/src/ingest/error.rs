//! Error types for the ingestion pipeline.
//!
//! Remote failures inside a submission never surface here: they are recorded
//! on the slot as a `Failed` stage. These errors cover rejected input and
//! operator actions that do not fit the current stage.

use crate::inference::InferenceError;
use std::path::PathBuf;
use studio_protocol::ingestion_models::StageKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    /// The uploaded payload has no bytes.
    #[error("Uploaded photo is empty")]
    EmptyImage,

    /// The uploaded payload is not a supported image.
    #[error("Uploaded file is not an image (type: {mime_type})")]
    NotAnImage { mime_type: String },

    /// Failed to read a photo from disk.
    #[error("Failed to read photo at {path}: {source}")]
    UnreadableFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A region was selected while the slot was not waiting for one.
    #[error("No region selection is pending (slot is {stage})")]
    NotSelecting { stage: StageKind },

    /// The selected region index does not exist.
    #[error("Region {index} does not exist ({count} candidates)")]
    RegionOutOfRange { index: usize, count: usize },

    /// A standalone remote call (outside the stage machine) failed.
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Type alias for Result with IngestError.
pub type IngestResult<T> = Result<T, IngestError>;
