//! Ingestion pipeline state models.
//!
//! The stage of an upload slot is a tagged union: each variant carries only
//! the fields that are meaningful for that stage, so a transition can never
//! leave stale candidates, results or errors behind.

use crate::region_models::{CandidateRegion, SizeChart};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Discriminant of [`IngestionStage`], used in events and logs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageKind {
    Idle,
    Analyzing,
    Selecting,
    Extracting,
    Done,
    Failed,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Idle => "idle",
            StageKind::Analyzing => "analyzing",
            StageKind::Selecting => "selecting",
            StageKind::Extracting => "extracting",
            StageKind::Done => "done",
            StageKind::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What the extraction stage is isolating from the source photograph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExtractionTarget {
    /// Segment the whole frame as a single flat-lay subject.
    WholeFrame,

    /// Extract one region the operator picked.
    Region { region: CandidateRegion },
}

/// Point-in-time state of one upload slot.
///
/// Lifecycle for a single submission:
/// Idle -> Analyzing -> (Selecting ->) Extracting -> Done | Failed
///
/// `Analyzing` may also go straight to `Failed` only through a failed
/// whole-frame extraction, which passes through `Extracting` first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum IngestionStage {
    /// No photograph is being processed.
    Idle,

    /// Person detection and region identification are running.
    Analyzing { preview_data_url: String },

    /// Several garments were found; waiting for the operator to pick one.
    ///
    /// There is no timeout: the slot waits until a region is selected or a
    /// new photograph supersedes it.
    Selecting {
        preview_data_url: String,
        candidate_regions: Vec<CandidateRegion>,
    },

    /// The extraction call is in flight.
    Extracting {
        preview_data_url: String,
        target: ExtractionTarget,
    },

    /// A clean garment image is available.
    Done {
        preview_data_url: String,
        result_image_url: String,
    },

    /// Retries were exhausted; stays here until a new photograph arrives.
    Failed {
        preview_data_url: String,
        error_message: String,
    },
}

impl IngestionStage {
    pub fn kind(&self) -> StageKind {
        match self {
            IngestionStage::Idle => StageKind::Idle,
            IngestionStage::Analyzing { .. } => StageKind::Analyzing,
            IngestionStage::Selecting { .. } => StageKind::Selecting,
            IngestionStage::Extracting { .. } => StageKind::Extracting,
            IngestionStage::Done { .. } => StageKind::Done,
            IngestionStage::Failed { .. } => StageKind::Failed,
        }
    }

    /// The displayable encoding of the source photograph, if any.
    pub fn preview_data_url(&self) -> Option<&str> {
        match self {
            IngestionStage::Idle => None,
            IngestionStage::Analyzing { preview_data_url }
            | IngestionStage::Selecting {
                preview_data_url, ..
            }
            | IngestionStage::Extracting {
                preview_data_url, ..
            }
            | IngestionStage::Done {
                preview_data_url, ..
            }
            | IngestionStage::Failed {
                preview_data_url, ..
            } => Some(preview_data_url),
        }
    }

    /// Candidate regions; empty outside `Selecting`.
    pub fn candidate_regions(&self) -> &[CandidateRegion] {
        match self {
            IngestionStage::Selecting {
                candidate_regions, ..
            } => candidate_regions,
            _ => &[],
        }
    }

    pub fn result_image_url(&self) -> Option<&str> {
        match self {
            IngestionStage::Done {
                result_image_url, ..
            } => Some(result_image_url),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            IngestionStage::Failed { error_message, .. } => Some(error_message),
            _ => None,
        }
    }
}

/// The catalog item an upload slot is filling in.
///
/// Only the fields the pipeline reads or seeds are modelled here.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
pub struct GarmentDraft {
    /// Color/label text. Seeded from the chosen region when still empty.
    #[serde(default)]
    pub label: Option<String>,

    /// Clean product image produced by the last successful ingestion.
    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub size_chart: Option<SizeChart>,
}
