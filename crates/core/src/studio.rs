//! Studio session tying upload slots and the preview registry together.
//!
//! The Studio is the entry point the UI layer holds on to. It owns one
//! ingestion pipeline per upload slot (created on first use) and a single
//! preview registry, all sharing one inference client and one event channel.

use crate::inference::InferenceClient;
use crate::ingest::IngestionPipeline;
use crate::preview::{PreviewPromptSource, PreviewRegistry};
use crate::retry::RetryPolicy;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use studio_protocol::config_models::StudioConfig;
use studio_protocol::ingestion_models::IngestionStage;
use studio_protocol::ipc::Event;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;

pub struct Studio {
    client: Arc<dyn InferenceClient>,
    retry: RetryPolicy,

    /// Upload slots by name. Each pipeline serializes its own state.
    slots: Mutex<HashMap<String, Arc<IngestionPipeline>>>,

    previews: PreviewRegistry,

    events_tx: UnboundedSender<Event>,
}

impl Studio {
    /// Create a studio from configuration.
    ///
    /// # Returns
    ///
    /// The studio and the receiving end of its event channel.
    pub fn new(
        config: &StudioConfig,
        client: Arc<dyn InferenceClient>,
        prompts: Arc<dyn PreviewPromptSource>,
    ) -> (Self, UnboundedReceiver<Event>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let retry = RetryPolicy::from(&config.retry);
        let previews = PreviewRegistry::new(
            Arc::clone(&client),
            prompts,
            retry.clone(),
            config.preview.max_in_flight,
            events_tx.clone(),
        );

        let studio = Self {
            client,
            retry,
            slots: Mutex::new(HashMap::new()),
            previews,
            events_tx,
        };
        (studio, events_rx)
    }

    /// The pipeline for upload slot `name`, created idle on first use.
    pub async fn slot(&self, name: &str) -> Arc<IngestionPipeline> {
        let mut slots = self.slots.lock().await;
        let pipeline = slots.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(slot = name, "Creating upload slot");
            Arc::new(IngestionPipeline::new(
                name,
                Arc::clone(&self.client),
                self.retry.clone(),
                self.events_tx.clone(),
            ))
        });
        Arc::clone(pipeline)
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Current stage of every slot, ordered by slot name.
    pub async fn slot_stages(&self) -> BTreeMap<String, IngestionStage> {
        let pipelines: Vec<(String, Arc<IngestionPipeline>)> = self
            .slots
            .lock()
            .await
            .iter()
            .map(|(name, pipeline)| (name.clone(), Arc::clone(pipeline)))
            .collect();

        let mut stages = BTreeMap::new();
        for (name, pipeline) in pipelines {
            stages.insert(name, pipeline.snapshot().await);
        }
        stages
    }

    pub async fn slot_count(&self) -> usize {
        self.slots.lock().await.len()
    }
}
