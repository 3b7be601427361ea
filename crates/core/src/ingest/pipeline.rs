//! Garment ingestion pipeline.
//!
//! The IngestionPipeline drives one upload slot from a submitted photograph
//! to a clean garment image. It picks the cheapest strategy that fits the
//! photo and falls back to whole-frame extraction whenever the analysis
//! stage cannot produce candidate regions.

use crate::ingest::error::IngestResult;
use crate::ingest::source::SourceImage;
use crate::ingest::task::{ExtractionJob, IngestionTask};
use crate::inference::{ImageHandle, InferenceClient};
use crate::retry::{with_retry, RetryPolicy};
use std::sync::Arc;
use studio_protocol::ingestion_models::{ExtractionTarget, GarmentDraft, IngestionStage};
use studio_protocol::ipc::Event;
use studio_protocol::region_models::{CandidateRegion, SizeChart};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;

/// Outcome of the analysis stage.
enum Analysis {
    /// Several garments are visible; the operator must choose.
    Regions(Vec<CandidateRegion>),

    /// Treat the whole frame as one flat-lay subject.
    WholeFrame,
}

/// Ingestion pipeline for a single upload slot.
///
/// Stages run strictly in sequence within a submission. A new submission
/// (or a dismissal) supersedes the current one; results of the superseded
/// run are discarded when they arrive.
pub struct IngestionPipeline {
    client: Arc<dyn InferenceClient>,
    retry: RetryPolicy,
    task: Mutex<IngestionTask>,
}

impl IngestionPipeline {
    /// Create a pipeline for `slot`.
    ///
    /// # Arguments
    ///
    /// * `slot` - Name of the upload slot, used in events and logs
    /// * `client` - Inference backend
    /// * `retry` - Retry policy applied to every remote call
    /// * `events_tx` - Channel for stage change events
    pub fn new(
        slot: impl Into<String>,
        client: Arc<dyn InferenceClient>,
        retry: RetryPolicy,
        events_tx: UnboundedSender<Event>,
    ) -> Self {
        Self {
            client,
            retry,
            task: Mutex::new(IngestionTask::new(slot.into(), events_tx)),
        }
    }

    /// Submit a photograph and run it as far as the pipeline can go unaided.
    ///
    /// The flow is:
    /// 1. `Analyzing`: detect a person; if one is present, identify regions
    /// 2. One or more regions: stop in `Selecting` and wait for the operator
    /// 3. Otherwise (flat-lay, no regions, or analysis failure): extract the
    ///    whole frame and finish in `Done` or `Failed`
    ///
    /// # Returns
    ///
    /// The slot's stage once this submission stops making progress. If a
    /// newer submission superseded this one mid-flight, that submission's
    /// current stage is returned instead.
    pub async fn submit_photo(&self, source: SourceImage) -> IngestionStage {
        let epoch = self.task.lock().await.begin(source.clone());

        match self.analyze(source.image()).await {
            Analysis::Regions(regions) => {
                self.task.lock().await.present_candidates(epoch, regions);
            }
            Analysis::WholeFrame => {
                let job = self.task.lock().await.begin_whole_frame(epoch);
                if let Some(job) = job {
                    self.run_extraction(job).await;
                }
            }
        }

        self.snapshot().await
    }

    /// Pick candidate region `index` and extract it.
    ///
    /// # Errors
    ///
    /// Returns an error without changing state if the slot is not waiting
    /// for a selection or the index is out of range. A failed extraction is
    /// not an error here; it leaves the slot in `Failed`.
    pub async fn select_region(&self, index: usize) -> IngestResult<IngestionStage> {
        let job = self.task.lock().await.choose_region(index)?;
        self.run_extraction(job).await;
        Ok(self.snapshot().await)
    }

    /// Abandon the current submission and return the slot to `Idle`.
    pub async fn dismiss(&self) {
        self.task.lock().await.reset();
    }

    /// Read a photographed size chart and attach it to the slot's draft.
    ///
    /// This runs outside the stage machine and leaves the stage untouched.
    pub async fn read_size_chart(&self, source: &SourceImage) -> IngestResult<SizeChart> {
        let image = source.image();
        let chart = with_retry(&self.retry, "analyze_size_chart", || {
            self.client.analyze_size_chart(image)
        })
        .await?;

        let mut task = self.task.lock().await;
        tracing::info!(slot = %task.slot(), rows = chart.rows.len(), "Size chart attached");
        task.draft_mut().size_chart = Some(chart.clone());
        Ok(chart)
    }

    /// Replace the destination draft, e.g. with metadata the operator typed.
    pub async fn set_draft(&self, draft: GarmentDraft) {
        *self.task.lock().await.draft_mut() = draft;
    }

    pub async fn snapshot(&self) -> IngestionStage {
        self.task.lock().await.stage().clone()
    }

    pub async fn draft(&self) -> GarmentDraft {
        self.task.lock().await.draft().clone()
    }

    pub async fn slot(&self) -> String {
        self.task.lock().await.slot().to_string()
    }

    /// Decide between region selection and whole-frame extraction.
    ///
    /// Analysis failures are not fatal: they are logged and the pipeline
    /// falls back to the whole frame.
    async fn analyze(&self, image: &ImageHandle) -> Analysis {
        let person = with_retry(&self.retry, "detect_person", || {
            self.client.detect_person(image)
        })
        .await;

        match person {
            Ok(false) => {
                tracing::info!("No person detected, treating photo as flat-lay");
                Analysis::WholeFrame
            }
            Ok(true) => {
                let regions = with_retry(&self.retry, "identify_regions", || {
                    self.client.identify_regions(image)
                })
                .await;

                match regions {
                    Ok(regions) if !regions.is_empty() => {
                        tracing::info!(count = regions.len(), "Garment regions identified");
                        Analysis::Regions(regions)
                    }
                    Ok(_) => {
                        tracing::info!("Person detected but no garment regions, using whole frame");
                        Analysis::WholeFrame
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "Region identification failed, using whole frame"
                        );
                        Analysis::WholeFrame
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Person detection failed, using whole frame");
                Analysis::WholeFrame
            }
        }
    }

    /// Run the extraction call for `job` and record the outcome.
    async fn run_extraction(&self, job: ExtractionJob) {
        let image = job.source.image();

        let (result, label) = match &job.target {
            ExtractionTarget::WholeFrame => {
                let result = with_retry(&self.retry, "extract_whole_frame", || {
                    self.client.extract_whole_frame(image)
                })
                .await
                .map_err(|e| format!("Could not isolate the garment from the photo: {e}"));
                (result, None)
            }
            ExtractionTarget::Region { region } => {
                let result = with_retry(&self.retry, "extract_region", || {
                    self.client.extract_region(image, &region.bounding_box)
                })
                .await
                .map_err(|e| {
                    format!(
                        "Could not extract the selected garment ({}): {e}",
                        region.label
                    )
                });
                (result, Some(region.label.as_str()))
            }
        };

        let mut task = self.task.lock().await;
        match result {
            Ok(extracted) => {
                task.complete(job.epoch, &extracted, label);
            }
            Err(message) => {
                task.fail(job.epoch, message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{InferenceError, MockInference, MockOp};
    use studio_protocol::ingestion_models::StageKind;
    use studio_protocol::region_models::BoundingBox;
    use tokio::sync::mpsc;

    fn photo() -> SourceImage {
        SourceImage::new("image/jpeg", vec![0xff, 0xd8, 0xff, 0x02]).unwrap()
    }

    fn pipeline(mock: MockInference) -> (IngestionPipeline, Arc<MockInference>) {
        let mock = Arc::new(mock);
        let (tx, _rx) = mpsc::unbounded_channel();
        let pipeline = IngestionPipeline::new(
            "front",
            Arc::clone(&mock) as Arc<dyn InferenceClient>,
            RetryPolicy::default(),
            tx,
        );
        (pipeline, mock)
    }

    #[tokio::test]
    async fn test_pipeline_new_is_idle() {
        let (pipeline, _mock) = pipeline(MockInference::new());
        assert_eq!(pipeline.snapshot().await, IngestionStage::Idle);
        assert_eq!(pipeline.slot().await, "front");
    }

    #[tokio::test]
    async fn test_flat_lay_goes_straight_to_done() {
        let (pipeline, mock) = pipeline(MockInference::new().with_person(Ok(false)));

        let stage = pipeline.submit_photo(photo()).await;

        assert_eq!(stage.kind(), StageKind::Done);
        assert_eq!(
            stage.result_image_url(),
            Some(MockInference::whole_frame_image().to_data_url().as_str())
        );
        assert_eq!(mock.calls(MockOp::IdentifyRegions), 0);
    }

    #[tokio::test]
    async fn test_dismiss_returns_to_idle() {
        let (pipeline, _mock) = pipeline(
            MockInference::new().with_whole_frame(Err(InferenceError::Unavailable(
                "down".to_string(),
            ))),
        );

        let stage = pipeline.submit_photo(photo()).await;
        assert_eq!(stage.kind(), StageKind::Failed);

        pipeline.dismiss().await;
        assert_eq!(pipeline.snapshot().await, IngestionStage::Idle);
    }

    #[tokio::test]
    async fn test_read_size_chart_updates_draft_only() {
        let chart: SizeChart = serde_json::from_value(serde_json::json!({
            "rows": [{ "size": "M", "measurements": { "chest": "100 cm" } }]
        }))
        .unwrap();
        let (pipeline, _mock) = pipeline(MockInference::new().with_size_chart(Ok(chart.clone())));

        let result = pipeline.read_size_chart(&photo()).await.unwrap();

        assert_eq!(result, chart);
        assert_eq!(pipeline.draft().await.size_chart, Some(chart));
        assert_eq!(pipeline.snapshot().await, IngestionStage::Idle);
    }

    #[tokio::test]
    async fn test_read_size_chart_error_surfaces() {
        let (pipeline, mock) = pipeline(
            MockInference::new()
                .with_size_chart(Err(InferenceError::Transport("timeout".to_string()))),
        );

        let result = pipeline.read_size_chart(&photo()).await;

        assert!(result.is_err());
        assert_eq!(mock.calls(MockOp::AnalyzeSizeChart), 2);
        assert!(pipeline.draft().await.size_chart.is_none());
    }

    #[tokio::test]
    async fn test_region_extraction_failure_message_names_region() {
        let regions = vec![CandidateRegion {
            label: "striped tee".to_string(),
            bounding_box: BoundingBox::full_frame(),
        }];
        let (pipeline, _mock) = pipeline(
            MockInference::new()
                .with_person(Ok(true))
                .with_regions(Ok(regions))
                .with_region_extract(Err(InferenceError::Api {
                    status: 500,
                    body: "boom".to_string(),
                })),
        );

        pipeline.submit_photo(photo()).await;
        let stage = pipeline.select_region(0).await.unwrap();

        let message = stage.error_message().unwrap();
        assert!(message.contains("striped tee"));
        assert!(message.contains("boom"));
    }
}
