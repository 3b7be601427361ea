//! Preview registry models.
//!
//! Each entry in the preview registry is keyed by an opaque string (usually a
//! pose identifier) and carries the state of the most recent request for it.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle status of a preview entry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreviewStatus {
    /// The generation call is in flight (or waiting for an admission slot).
    Loading,

    /// A preview image is available.
    Success,

    /// The generation call failed after retries.
    Error,
}

/// State of one preview key as seen by the rendering layer.
///
/// `image_url` exists only on `Success` and `error` only on `Error`.
///
/// ```json
/// { "status": "SUCCESS", "image_url": "data:image/png;base64,..." }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreviewEntry {
    Loading,
    Success { image_url: String },
    Error { error: String },
}

impl PreviewEntry {
    pub fn status(&self) -> PreviewStatus {
        match self {
            PreviewEntry::Loading => PreviewStatus::Loading,
            PreviewEntry::Success { .. } => PreviewStatus::Success,
            PreviewEntry::Error { .. } => PreviewStatus::Error,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PreviewEntry::Loading)
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            PreviewEntry::Success { image_url } => Some(image_url),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PreviewEntry::Error { error } => Some(error),
            _ => None,
        }
    }
}
