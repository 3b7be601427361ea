//! Upload slot state machine.
//!
//! An [`IngestionTask`] is the single owner of one slot's stage, source photo
//! and destination draft. Every submission mints a new epoch; transitions
//! that follow a remote call carry the epoch they were started under and are
//! dropped if a newer submission (or a dismissal) has happened since.

use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::source::SourceImage;
use crate::inference::ImageHandle;
use studio_protocol::ingestion_models::{ExtractionTarget, GarmentDraft, IngestionStage};
use studio_protocol::ipc::Event;
use studio_protocol::region_models::CandidateRegion;
use tokio::sync::mpsc::UnboundedSender;

/// Ticket for one extraction run, handed out when a slot enters `Extracting`.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub epoch: u64,
    pub source: SourceImage,
    pub target: ExtractionTarget,
}

pub struct IngestionTask {
    slot: String,
    epoch: u64,
    source: Option<SourceImage>,
    stage: IngestionStage,
    draft: GarmentDraft,
    events_tx: UnboundedSender<Event>,
}

impl IngestionTask {
    /// Create an idle slot.
    pub fn new(slot: String, events_tx: UnboundedSender<Event>) -> Self {
        Self {
            slot,
            epoch: 0,
            source: None,
            stage: IngestionStage::Idle,
            draft: GarmentDraft::default(),
            events_tx,
        }
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn stage(&self) -> &IngestionStage {
        &self.stage
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    pub fn draft(&self) -> &GarmentDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut GarmentDraft {
        &mut self.draft
    }

    /// Whether `epoch` still owns this slot.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// Start a new submission, superseding whatever was in progress.
    ///
    /// Returns the epoch of the new submission.
    pub fn begin(&mut self, source: SourceImage) -> u64 {
        if !matches!(self.stage, IngestionStage::Idle) {
            self.reset();
        }
        self.epoch += 1;
        let preview_data_url = source.preview_data_url();
        self.source = Some(source);
        self.transition(IngestionStage::Analyzing { preview_data_url });
        self.epoch
    }

    /// Drop the current submission and return to `Idle`.
    ///
    /// Bumps the epoch so results still in flight are discarded.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.source = None;
        self.transition(IngestionStage::Idle);
    }

    /// `Analyzing -> Selecting`. Returns false if the submission is stale.
    pub fn present_candidates(
        &mut self,
        epoch: u64,
        candidate_regions: Vec<CandidateRegion>,
    ) -> bool {
        if !self.accepts(epoch, "present_candidates") {
            return false;
        }
        let Some(preview_data_url) = self.preview_data_url() else {
            return false;
        };
        self.transition(IngestionStage::Selecting {
            preview_data_url,
            candidate_regions,
        });
        true
    }

    /// `Analyzing -> Extracting` for the whole frame.
    pub fn begin_whole_frame(&mut self, epoch: u64) -> Option<ExtractionJob> {
        if !self.accepts(epoch, "begin_whole_frame") {
            return None;
        }
        self.enter_extracting(ExtractionTarget::WholeFrame)
    }

    /// `Selecting -> Extracting` for the region at `index`.
    pub fn choose_region(&mut self, index: usize) -> IngestResult<ExtractionJob> {
        let region = match &self.stage {
            IngestionStage::Selecting {
                candidate_regions, ..
            } => candidate_regions
                .get(index)
                .cloned()
                .ok_or(IngestError::RegionOutOfRange {
                    index,
                    count: candidate_regions.len(),
                })?,
            other => {
                return Err(IngestError::NotSelecting {
                    stage: other.kind(),
                })
            }
        };

        tracing::info!(slot = %self.slot, index, label = %region.label, "Region selected");
        self.enter_extracting(ExtractionTarget::Region { region })
            .ok_or(IngestError::NotSelecting {
                stage: self.stage.kind(),
            })
    }

    /// `Extracting -> Done`.
    ///
    /// Records the result on the draft and seeds the draft label from
    /// `label` when the draft has none yet.
    pub fn complete(&mut self, epoch: u64, image: &ImageHandle, label: Option<&str>) -> bool {
        if !self.accepts(epoch, "complete") {
            return false;
        }
        let Some(preview_data_url) = self.preview_data_url() else {
            return false;
        };
        let result_image_url = image.to_data_url();

        self.draft.image_url = Some(result_image_url.clone());
        if self.draft.label.is_none() {
            if let Some(label) = label {
                self.draft.label = Some(label.to_string());
            }
        }

        self.transition(IngestionStage::Done {
            preview_data_url,
            result_image_url,
        });
        true
    }

    /// `Extracting -> Failed`.
    pub fn fail(&mut self, epoch: u64, error_message: String) -> bool {
        if !self.accepts(epoch, "fail") {
            return false;
        }
        let Some(preview_data_url) = self.preview_data_url() else {
            return false;
        };
        tracing::error!(slot = %self.slot, error = %error_message, "Ingestion failed");
        self.transition(IngestionStage::Failed {
            preview_data_url,
            error_message: error_message.clone(),
        });
        let _ = self.events_tx.send(Event::IngestionFailed {
            slot: self.slot.clone(),
            message: error_message,
        });
        true
    }

    fn enter_extracting(&mut self, target: ExtractionTarget) -> Option<ExtractionJob> {
        let source = self.source.clone()?;
        self.transition(IngestionStage::Extracting {
            preview_data_url: source.preview_data_url(),
            target: target.clone(),
        });
        Some(ExtractionJob {
            epoch: self.epoch,
            source,
            target,
        })
    }

    fn accepts(&self, epoch: u64, step: &str) -> bool {
        let current = self.is_current(epoch);
        if !current {
            tracing::debug!(
                slot = %self.slot,
                epoch,
                current_epoch = self.epoch,
                step,
                "Dropping result of superseded submission",
            );
        }
        current
    }

    fn preview_data_url(&self) -> Option<String> {
        self.stage.preview_data_url().map(str::to_string)
    }

    fn transition(&mut self, stage: IngestionStage) {
        let kind = stage.kind();
        self.stage = stage;
        tracing::info!(slot = %self.slot, epoch = self.epoch, stage = %kind, "Stage changed");
        let _ = self.events_tx.send(Event::IngestionStageChanged {
            slot: self.slot.clone(),
            stage: kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_protocol::ingestion_models::StageKind;
    use studio_protocol::region_models::BoundingBox;
    use tokio::sync::mpsc;

    fn photo() -> SourceImage {
        SourceImage::new("image/jpeg", vec![0xff, 0xd8, 0xff, 0x01]).unwrap()
    }

    fn region(label: &str) -> CandidateRegion {
        CandidateRegion {
            label: label.to_string(),
            bounding_box: BoundingBox::full_frame(),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_new_task_is_idle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let task = IngestionTask::new("front".to_string(), tx);
        assert_eq!(task.stage(), &IngestionStage::Idle);
        assert!(task.source().is_none());
        assert_eq!(task.epoch(), 0);
    }

    #[test]
    fn test_begin_enters_analyzing_and_emits_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut task = IngestionTask::new("front".to_string(), tx);

        let epoch = task.begin(photo());

        assert_eq!(epoch, 1);
        assert_eq!(task.stage().kind(), StageKind::Analyzing);
        assert!(task.source().is_some());
        assert_eq!(
            drain(&mut rx),
            vec![Event::IngestionStageChanged {
                slot: "front".to_string(),
                stage: StageKind::Analyzing,
            }]
        );
    }

    #[test]
    fn test_stale_epoch_is_dropped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut task = IngestionTask::new("front".to_string(), tx);

        let first = task.begin(photo());
        let second = task.begin(photo());
        assert_ne!(first, second);

        assert!(!task.present_candidates(first, vec![region("old")]));
        assert_eq!(task.stage().kind(), StageKind::Analyzing);

        assert!(task.present_candidates(second, vec![region("new")]));
        assert_eq!(task.stage().candidate_regions()[0].label, "new");
    }

    #[test]
    fn test_choose_region_requires_selecting() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut task = IngestionTask::new("front".to_string(), tx);
        task.begin(photo());

        let err = task.choose_region(0).unwrap_err();
        assert!(matches!(
            err,
            IngestError::NotSelecting {
                stage: StageKind::Analyzing
            }
        ));
    }

    #[test]
    fn test_choose_region_out_of_range_keeps_selecting() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut task = IngestionTask::new("front".to_string(), tx);
        let epoch = task.begin(photo());
        task.present_candidates(epoch, vec![region("a"), region("b")]);

        let err = task.choose_region(2).unwrap_err();
        assert!(matches!(
            err,
            IngestError::RegionOutOfRange { index: 2, count: 2 }
        ));
        assert_eq!(task.stage().kind(), StageKind::Selecting);
    }

    #[test]
    fn test_complete_seeds_label_only_when_missing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut task = IngestionTask::new("front".to_string(), tx);
        let image = ImageHandle::new("image/png", b"clean".to_vec());

        let epoch = task.begin(photo());
        task.present_candidates(epoch, vec![region("olive parka")]);
        let job = task.choose_region(0).unwrap();
        assert!(task.complete(job.epoch, &image, Some("olive parka")));
        assert_eq!(task.draft().label.as_deref(), Some("olive parka"));
        assert_eq!(task.draft().image_url, Some(image.to_data_url()));

        let epoch = task.begin(photo());
        task.present_candidates(epoch, vec![region("black boots")]);
        let job = task.choose_region(0).unwrap();
        task.complete(job.epoch, &image, Some("black boots"));
        assert_eq!(task.draft().label.as_deref(), Some("olive parka"));
    }

    #[test]
    fn test_fail_emits_single_failure_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut task = IngestionTask::new("front".to_string(), tx);

        let epoch = task.begin(photo());
        task.begin_whole_frame(epoch).unwrap();
        drain(&mut rx);

        assert!(task.fail(epoch, "segmentation failed".to_string()));
        assert_eq!(task.stage().error_message(), Some("segmentation failed"));

        // The stage change lands before the failure notice
        assert_eq!(
            drain(&mut rx),
            vec![
                Event::IngestionStageChanged {
                    slot: "front".to_string(),
                    stage: StageKind::Failed,
                },
                Event::IngestionFailed {
                    slot: "front".to_string(),
                    message: "segmentation failed".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_reset_clears_everything_but_draft() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut task = IngestionTask::new("front".to_string(), tx);
        task.draft_mut().label = Some("ivory".to_string());

        let epoch = task.begin(photo());
        task.begin_whole_frame(epoch).unwrap();
        task.reset();

        assert_eq!(task.stage(), &IngestionStage::Idle);
        assert!(task.source().is_none());
        assert!(!task.is_current(epoch));
        assert_eq!(task.draft().label.as_deref(), Some("ivory"));
    }
}
