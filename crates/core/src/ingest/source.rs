//! Validated source photographs.

use crate::ingest::error::{IngestError, IngestResult};
use crate::inference::ImageHandle;
use std::path::Path;

/// DIB header sizes found in real BMP files (core, info, v2 to v5).
const BMP_DIB_HEADER_SIZES: &[u32] = &[12, 40, 52, 56, 108, 124];

/// Detect the MIME type of an image payload from its content.
///
/// Returns `None` unless the bytes are recognized as an image.
pub fn sniff_image(data: &[u8]) -> Option<&'static str> {
    let kind = infer::get(data)?;
    if kind.matcher_type() != infer::MatcherType::Image {
        return None;
    }
    // A two-byte "BM" signature alone matches plenty of text.
    if kind.mime_type() == "image/bmp" && !has_bmp_header(data) {
        return None;
    }
    Some(kind.mime_type())
}

fn has_bmp_header(data: &[u8]) -> bool {
    match data.get(14..18) {
        Some(&[a, b, c, d]) => {
            BMP_DIB_HEADER_SIZES.contains(&u32::from_le_bytes([a, b, c, d]))
        }
        _ => false,
    }
}

/// A photograph accepted for ingestion.
///
/// Construction is the input-rejection boundary: anything that is empty or
/// not an image never reaches an upload slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    image: ImageHandle,
}

impl SourceImage {
    /// Accept `data` declared as `mime_type`.
    ///
    /// The declared type must be `image/*` and the content must be
    /// recognized as an image. The detected type is the one recorded.
    pub fn new(mime_type: &str, data: Vec<u8>) -> IngestResult<Self> {
        if data.is_empty() {
            return Err(IngestError::EmptyImage);
        }
        if !mime_type.starts_with("image/") {
            return Err(IngestError::NotAnImage {
                mime_type: mime_type.to_string(),
            });
        }
        let mime = sniff_image(&data).ok_or_else(|| IngestError::NotAnImage {
            mime_type: format!("{mime_type} (unrecognized content)"),
        })?;
        Ok(Self {
            image: ImageHandle::new(mime, data),
        })
    }

    /// Read a photograph from disk.
    ///
    /// The type always comes from the content. The file extension only
    /// labels the rejection when the content is not an image.
    pub async fn from_path(path: &Path) -> IngestResult<Self> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| IngestError::UnreadableFile {
                path: path.to_path_buf(),
                source,
            })?;
        if data.is_empty() {
            return Err(IngestError::EmptyImage);
        }

        match sniff_image(&data) {
            Some(mime) => Self::new(mime, data),
            None => {
                let guessed = mime_guess::from_path(path)
                    .first_raw()
                    .unwrap_or("application/octet-stream");
                tracing::debug!(
                    path = %path.display(),
                    guessed,
                    "Rejecting file with non-image content",
                );
                Err(IngestError::NotAnImage {
                    mime_type: format!("{guessed} (unrecognized content)"),
                })
            }
        }
    }

    pub fn image(&self) -> &ImageHandle {
        &self.image
    }

    /// Displayable encoding shown while the photo is processed.
    pub fn preview_data_url(&self) -> String {
        self.image.to_data_url()
    }
}
