//! Test fixtures for photos, regions and wired-up components.

use std::sync::Arc;
use studio_core::inference::{InferenceClient, MockInference, MockOp};
use studio_core::ingest::{IngestionPipeline, SourceImage};
use studio_core::preview::{PreviewRegistry, PromptTable};
use studio_core::retry::RetryPolicy;
use studio_protocol::ipc::Event;
use studio_protocol::region_models::{BoundingBox, CandidateRegion};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// A minimal JPEG-looking upload.
pub fn sample_photo() -> SourceImage {
    SourceImage::new("image/jpeg", vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10])
        .expect("sample photo should be accepted")
}

/// `count` candidate regions, each with a distinct horizontal band.
pub fn sample_regions(count: usize) -> Vec<CandidateRegion> {
    let labels = ["denim jacket", "white tee", "pleated skirt", "loafers"];
    (0..count)
        .map(|i| {
            let top = i as f64 / count as f64;
            let bottom = (i + 1) as f64 / count as f64;
            CandidateRegion {
                label: labels
                    .get(i)
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| format!("garment {}", i + 1)),
                bounding_box: BoundingBox::normalized(top, 0.0, bottom, 1.0)
                    .expect("band should be normalized"),
            }
        })
        .collect()
}

/// A pipeline for slot "front" backed by `mock`.
pub fn create_pipeline(
    mock: MockInference,
    retry: RetryPolicy,
) -> (IngestionPipeline, Arc<MockInference>, UnboundedReceiver<Event>) {
    let mock = Arc::new(mock);
    let (tx, rx) = mpsc::unbounded_channel();
    let pipeline = IngestionPipeline::new(
        "front",
        Arc::clone(&mock) as Arc<dyn InferenceClient>,
        retry,
        tx,
    );
    (pipeline, mock, rx)
}

/// A preview registry backed by `mock`.
pub fn create_registry(
    mock: MockInference,
    retry: RetryPolicy,
    max_in_flight: Option<usize>,
) -> (PreviewRegistry, Arc<MockInference>, UnboundedReceiver<Event>) {
    let mock = Arc::new(mock);
    let (tx, rx) = mpsc::unbounded_channel();
    let registry = PreviewRegistry::new(
        Arc::clone(&mock) as Arc<dyn InferenceClient>,
        Arc::new(PromptTable::new("model wearing the garment, studio light")),
        retry,
        max_in_flight,
        tx,
    );
    (registry, mock, rx)
}

/// Yield until `mock` has seen at least `count` calls to `op`.
pub async fn wait_for_calls(mock: &MockInference, op: MockOp, count: usize) {
    let waited = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while mock.calls(op) < count {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {count} calls to {op:?}");
}

/// Collect every event currently queued on `rx`.
pub fn drain_events(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
