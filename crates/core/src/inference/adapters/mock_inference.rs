//! Scriptable in-process inference backend for testing.

use crate::inference::base::{ImageHandle, InferenceClient, InferenceError, PreviewRequest};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use studio_protocol::region_models::{BoundingBox, CandidateRegion, SizeChart};
use tokio::sync::Semaphore;

/// Identifies one remote operation of [`InferenceClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    DetectPerson,
    IdentifyRegions,
    ExtractRegion,
    ExtractWholeFrame,
    GeneratePreview,
    AnalyzeSizeChart,
}

/// Queued outcomes for one operation, falling back to a fixed outcome once
/// the queue is drained.
struct Script<T> {
    queued: VecDeque<Result<T, InferenceError>>,
    fallback: Result<T, InferenceError>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: Result<T, InferenceError>) -> Self {
        Self {
            queued: VecDeque::new(),
            fallback,
        }
    }

    fn next(&mut self) -> Result<T, InferenceError> {
        self.queued
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock backend with per-operation scripts, call recording and gates.
///
/// Preview images are synthesized as `"<key>#<n>"` where `n` counts the
/// generation calls for that key, so a test can tell which call produced a
/// result. A held operation blocks every call until permits are released.
pub struct MockInference {
    person: Mutex<Script<bool>>,
    regions: Mutex<Script<Vec<CandidateRegion>>>,
    region_extract: Mutex<Script<ImageHandle>>,
    whole_frame: Mutex<Script<ImageHandle>>,
    size_chart: Mutex<Script<SizeChart>>,
    preview_failures: Mutex<HashMap<String, VecDeque<InferenceError>>>,
    preview_counts: Mutex<HashMap<String, usize>>,
    calls: Mutex<HashMap<MockOp, usize>>,
    extracted_boxes: Mutex<Vec<BoundingBox>>,
    gates: Mutex<HashMap<MockOp, Arc<Semaphore>>>,
}

impl Default for MockInference {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInference {
    /// A backend that sees a flat-lay photo and extracts it successfully.
    pub fn new() -> Self {
        Self {
            person: Mutex::new(Script::new(Ok(false))),
            regions: Mutex::new(Script::new(Ok(Vec::new()))),
            region_extract: Mutex::new(Script::new(Ok(Self::region_image()))),
            whole_frame: Mutex::new(Script::new(Ok(Self::whole_frame_image()))),
            size_chart: Mutex::new(Script::new(Ok(SizeChart::default()))),
            preview_failures: Mutex::new(HashMap::new()),
            preview_counts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            extracted_boxes: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Image returned by a successful `extract_region`.
    pub fn region_image() -> ImageHandle {
        ImageHandle::new("image/png", b"region".to_vec())
    }

    /// Image returned by a successful `extract_whole_frame`.
    pub fn whole_frame_image() -> ImageHandle {
        ImageHandle::new("image/png", b"whole-frame".to_vec())
    }

    /// Image a successful preview call returns for the `n`th call on `key`.
    pub fn preview_image(key: &str, n: usize) -> ImageHandle {
        ImageHandle::new("image/png", format!("{key}#{n}").into_bytes())
    }

    pub fn with_person(self, outcome: Result<bool, InferenceError>) -> Self {
        lock(&self.person).fallback = outcome;
        self
    }

    pub fn with_regions(self, outcome: Result<Vec<CandidateRegion>, InferenceError>) -> Self {
        lock(&self.regions).fallback = outcome;
        self
    }

    pub fn with_region_extract(self, outcome: Result<ImageHandle, InferenceError>) -> Self {
        lock(&self.region_extract).fallback = outcome;
        self
    }

    pub fn with_whole_frame(self, outcome: Result<ImageHandle, InferenceError>) -> Self {
        lock(&self.whole_frame).fallback = outcome;
        self
    }

    pub fn with_size_chart(self, outcome: Result<SizeChart, InferenceError>) -> Self {
        lock(&self.size_chart).fallback = outcome;
        self
    }

    /// Block every call to `op` until [`MockInference::release`] hands out
    /// permits.
    pub fn hold(self, op: MockOp) -> Self {
        lock(&self.gates).insert(op, Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `count` held calls to `op` proceed.
    pub fn release(&self, op: MockOp, count: usize) {
        if let Some(gate) = lock(&self.gates).get(&op) {
            gate.add_permits(count);
        }
    }

    pub fn queue_person(&self, outcome: Result<bool, InferenceError>) {
        lock(&self.person).queued.push_back(outcome);
    }

    pub fn queue_regions(&self, outcome: Result<Vec<CandidateRegion>, InferenceError>) {
        lock(&self.regions).queued.push_back(outcome);
    }

    pub fn queue_region_extract(&self, outcome: Result<ImageHandle, InferenceError>) {
        lock(&self.region_extract).queued.push_back(outcome);
    }

    pub fn queue_whole_frame(&self, outcome: Result<ImageHandle, InferenceError>) {
        lock(&self.whole_frame).queued.push_back(outcome);
    }

    /// Make the next generation call for `key` fail with `error`.
    pub fn fail_preview(&self, key: &str, error: InferenceError) {
        lock(&self.preview_failures)
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }

    /// Number of calls made to `op` so far, including held ones.
    pub fn calls(&self, op: MockOp) -> usize {
        lock(&self.calls).get(&op).copied().unwrap_or(0)
    }

    /// Number of generation calls made for `key`.
    pub fn preview_calls(&self, key: &str) -> usize {
        lock(&self.preview_counts).get(key).copied().unwrap_or(0)
    }

    /// Bounding boxes passed to `extract_region`, in call order.
    pub fn extracted_boxes(&self) -> Vec<BoundingBox> {
        lock(&self.extracted_boxes).clone()
    }

    async fn enter(&self, op: MockOp) {
        *lock(&self.calls).entry(op).or_insert(0) += 1;

        let gate = lock(&self.gates).get(&op).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl InferenceClient for MockInference {
    async fn detect_person(&self, _image: &ImageHandle) -> Result<bool, InferenceError> {
        self.enter(MockOp::DetectPerson).await;
        lock(&self.person).next()
    }

    async fn identify_regions(
        &self,
        _image: &ImageHandle,
    ) -> Result<Vec<CandidateRegion>, InferenceError> {
        self.enter(MockOp::IdentifyRegions).await;
        lock(&self.regions).next()
    }

    async fn extract_region(
        &self,
        _image: &ImageHandle,
        bounding_box: &BoundingBox,
    ) -> Result<ImageHandle, InferenceError> {
        lock(&self.extracted_boxes).push(*bounding_box);
        self.enter(MockOp::ExtractRegion).await;
        lock(&self.region_extract).next()
    }

    async fn extract_whole_frame(
        &self,
        _image: &ImageHandle,
    ) -> Result<ImageHandle, InferenceError> {
        self.enter(MockOp::ExtractWholeFrame).await;
        lock(&self.whole_frame).next()
    }

    async fn generate_preview(
        &self,
        request: &PreviewRequest,
    ) -> Result<ImageHandle, InferenceError> {
        let n = {
            let mut counts = lock(&self.preview_counts);
            let count = counts.entry(request.key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.enter(MockOp::GeneratePreview).await;

        let failure = lock(&self.preview_failures)
            .get_mut(&request.key)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(error) => Err(error),
            None => Ok(Self::preview_image(&request.key, n)),
        }
    }

    async fn analyze_size_chart(&self, _image: &ImageHandle) -> Result<SizeChart, InferenceError> {
        self.enter(MockOp::AnalyzeSizeChart).await;
        lock(&self.size_chart).next()
    }
}
