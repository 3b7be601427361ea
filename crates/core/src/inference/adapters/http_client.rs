//! HTTP adapter for the remote inference service.
//!
//! Each operation is one `POST {base_url}/v1/<operation>` with a JSON body.
//! Images travel as `{ "mime_type": ..., "data": <base64> }` and bounding
//! boxes as `[y_min, x_min, y_max, x_max]` normalized to `[0, 1]`.

use crate::inference::base::{ImageHandle, InferenceClient, InferenceError, PreviewRequest};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use studio_protocol::config_models::InferenceConfig;
use studio_protocol::region_models::{BoundingBox, CandidateRegion, SizeChart};

/// Wire form of an image.
#[derive(Serialize, Deserialize)]
struct WireImage {
    mime_type: String,
    data: String,
}

impl From<&ImageHandle> for WireImage {
    fn from(image: &ImageHandle) -> Self {
        Self {
            mime_type: image.mime_type().to_string(),
            data: image.to_base64(),
        }
    }
}

impl TryFrom<WireImage> for ImageHandle {
    type Error = InferenceError;

    fn try_from(wire: WireImage) -> Result<Self, Self::Error> {
        let image = ImageHandle::from_base64(wire.mime_type, &wire.data)
            .map_err(|e| InferenceError::InvalidResponse(format!("bad image payload: {e}")))?;
        if image.is_empty() {
            return Err(InferenceError::InvalidResponse(
                "backend returned an empty image".to_string(),
            ));
        }
        Ok(image)
    }
}

type WireBox = [f64; 4];

fn to_wire_box(bbox: &BoundingBox) -> WireBox {
    [bbox.y_min, bbox.x_min, bbox.y_max, bbox.x_max]
}

#[derive(Serialize)]
struct ImageBody {
    image: WireImage,
}

#[derive(Serialize)]
struct ExtractRegionBody {
    image: WireImage,
    bounding_box: WireBox,
}

#[derive(Serialize)]
struct GeneratePreviewBody<'a> {
    key: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference_image: Option<WireImage>,
}

#[derive(Deserialize)]
struct DetectPersonResponse {
    is_person: bool,
}

#[derive(Deserialize)]
struct WireRegion {
    label: String,
    bounding_box: WireBox,
}

#[derive(Deserialize)]
struct IdentifyRegionsResponse {
    #[serde(default)]
    regions: Vec<WireRegion>,
}

#[derive(Deserialize)]
struct ImageResponse {
    image: WireImage,
}

fn into_candidates(regions: Vec<WireRegion>) -> Result<Vec<CandidateRegion>, InferenceError> {
    regions
        .into_iter()
        .map(|region| {
            let [y_min, x_min, y_max, x_max] = region.bounding_box;
            let bounding_box = BoundingBox::normalized(y_min, x_min, y_max, x_max).ok_or_else(
                || {
                    InferenceError::InvalidResponse(format!(
                        "bounding box for '{}' is not normalized: {:?}",
                        region.label, region.bounding_box
                    ))
                },
            )?;
            Ok(CandidateRegion {
                label: region.label,
                bounding_box,
            })
        })
        .collect()
}

/// Inference client talking JSON over HTTP.
pub struct HttpInferenceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpInferenceClient {
    /// Build a client from configuration.
    ///
    /// The bearer token, if any, is read once from the environment variable
    /// named by `api_key_env`.
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InferenceError::Unavailable(format!("Failed to build HTTP client: {e}")))?;

        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok());

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, operation: &str, body: &B) -> Result<R, InferenceError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/v1/{operation}", self.base_url);
        tracing::debug!(%url, "Calling inference backend");

        let mut request = self.client.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| InferenceError::Transport(format!("{operation}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| InferenceError::InvalidResponse(format!("{operation}: {e}")))
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn detect_person(&self, image: &ImageHandle) -> Result<bool, InferenceError> {
        let body = ImageBody {
            image: image.into(),
        };
        let response: DetectPersonResponse = self.post("detect-person", &body).await?;
        Ok(response.is_person)
    }

    async fn identify_regions(
        &self,
        image: &ImageHandle,
    ) -> Result<Vec<CandidateRegion>, InferenceError> {
        let body = ImageBody {
            image: image.into(),
        };
        let response: IdentifyRegionsResponse = self.post("identify-regions", &body).await?;
        into_candidates(response.regions)
    }

    async fn extract_region(
        &self,
        image: &ImageHandle,
        bounding_box: &BoundingBox,
    ) -> Result<ImageHandle, InferenceError> {
        let body = ExtractRegionBody {
            image: image.into(),
            bounding_box: to_wire_box(bounding_box),
        };
        let response: ImageResponse = self.post("extract-region", &body).await?;
        response.image.try_into()
    }

    async fn extract_whole_frame(
        &self,
        image: &ImageHandle,
    ) -> Result<ImageHandle, InferenceError> {
        let body = ImageBody {
            image: image.into(),
        };
        let response: ImageResponse = self.post("extract-whole-frame", &body).await?;
        response.image.try_into()
    }

    async fn generate_preview(
        &self,
        request: &PreviewRequest,
    ) -> Result<ImageHandle, InferenceError> {
        let body = GeneratePreviewBody {
            key: &request.key,
            prompt: &request.prompt,
            reference_image: request.reference_image.as_ref().map(WireImage::from),
        };
        let response: ImageResponse = self.post("generate-preview", &body).await?;
        response.image.try_into()
    }

    async fn analyze_size_chart(&self, image: &ImageHandle) -> Result<SizeChart, InferenceError> {
        let body = ImageBody {
            image: image.into(),
        };
        self.post("analyze-size-chart", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_candidates_accepts_normalized_boxes() {
        let response: IdentifyRegionsResponse = serde_json::from_str(
            r#"{"regions": [
                {"label": "white shirt", "bounding_box": [0.1, 0.2, 0.5, 0.8]},
                {"label": "blue jeans", "bounding_box": [0.5, 0.2, 1.0, 0.8]}
            ]}"#,
        )
        .unwrap();

        let candidates = into_candidates(response.regions).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].label, "blue jeans");
        assert_eq!(candidates[1].bounding_box.y_min, 0.5);
        assert_eq!(candidates[1].bounding_box.x_max, 0.8);
    }

    #[test]
    fn test_into_candidates_rejects_pixel_boxes() {
        let response: IdentifyRegionsResponse = serde_json::from_str(
            r#"{"regions": [{"label": "coat", "bounding_box": [120, 40, 900, 610]}]}"#,
        )
        .unwrap();

        let err = into_candidates(response.regions).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidResponse(msg) if msg.contains("coat")));
    }

    #[test]
    fn test_missing_regions_field_is_empty() {
        let response: IdentifyRegionsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.regions.is_empty());
    }

    #[test]
    fn test_wire_image_rejects_empty_payload() {
        let wire = WireImage {
            mime_type: "image/png".to_string(),
            data: String::new(),
        };
        let result: Result<ImageHandle, _> = wire.try_into();
        assert!(matches!(result, Err(InferenceError::InvalidResponse(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = InferenceConfig {
            base_url: "http://localhost:8700/".to_string(),
            ..InferenceConfig::default()
        };
        let client = HttpInferenceClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8700");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let config = InferenceConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 5,
            ..InferenceConfig::default()
        };
        let client = HttpInferenceClient::new(&config).unwrap();
        let image = ImageHandle::new("image/jpeg", vec![0xff, 0xd8]);

        let result = client.detect_person(&image).await;
        assert!(matches!(result, Err(InferenceError::Transport(_))));
    }
}
