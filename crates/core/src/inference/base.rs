//! Base InferenceClient trait and supporting types.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::sync::Arc;
use studio_protocol::region_models::{BoundingBox, CandidateRegion, SizeChart};
use thiserror::Error;

/// Image bytes tagged with their MIME type.
///
/// Cloning is cheap; the payload is shared.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageHandle {
    mime_type: String,
    data: Arc<[u8]>,
}

impl ImageHandle {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: Arc::from(data.into()),
        }
    }

    /// Decode a base64 payload as returned by the inference backend.
    pub fn from_base64(
        mime_type: impl Into<String>,
        encoded: &str,
    ) -> Result<Self, base64::DecodeError> {
        let data = STANDARD.decode(encoded.trim())?;
        Ok(Self::new(mime_type, data))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Displayable `data:` URL for the rendering layer.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Payload for one preview generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    /// Registry key the preview is generated for.
    pub key: String,

    /// Styling/pose prompt text for this key.
    pub prompt: String,

    /// Garment image the model should wear, if one has been ingested.
    pub reference_image: Option<ImageHandle>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("Inference backend not available: {0}")]
    Unavailable(String),
    #[error("Inference API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Inference request failed: {0}")]
    Transport(String),
    #[error("Invalid inference response: {0}")]
    InvalidResponse(String),
}

/// Remote image-inference operations consumed by the orchestration layer.
///
/// Every call is fallible and has no side effects visible to the caller
/// beyond its return value.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Whether the photograph shows a person wearing the garment.
    async fn detect_person(&self, image: &ImageHandle) -> Result<bool, InferenceError>;

    /// Garment-like regions in the photograph. May be empty.
    async fn identify_regions(
        &self,
        image: &ImageHandle,
    ) -> Result<Vec<CandidateRegion>, InferenceError>;

    /// Isolate the garment inside `bounding_box`.
    async fn extract_region(
        &self,
        image: &ImageHandle,
        bounding_box: &BoundingBox,
    ) -> Result<ImageHandle, InferenceError>;

    /// Segment a flat-lay photograph as a single subject.
    async fn extract_whole_frame(&self, image: &ImageHandle) -> Result<ImageHandle, InferenceError>;

    async fn generate_preview(&self, request: &PreviewRequest)
        -> Result<ImageHandle, InferenceError>;

    /// Read a photographed size chart.
    async fn analyze_size_chart(&self, image: &ImageHandle) -> Result<SizeChart, InferenceError>;
}
