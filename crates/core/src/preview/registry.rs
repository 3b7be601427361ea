//! Keyed registry of concurrent preview generations.
//!
//! The registry is a map from key to the state of the latest request for
//! that key. Each request is stamped with a generation number; a completion
//! is applied only while its generation is still the live one for the key,
//! so results for reverted, cleared or replaced entries are silently
//! dropped.

use crate::inference::InferenceClient;
use crate::preview::prompts::PreviewPromptSource;
use crate::retry::{with_retry, RetryPolicy};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use studio_protocol::ipc::Event;
use studio_protocol::preview_models::PreviewEntry;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;

/// A live entry: its state plus the generation that owns it.
struct Slot {
    generation: u64,
    entry: PreviewEntry,
}

/// Handle to one launched generation call.
#[derive(Debug)]
pub struct PreviewTicket {
    key: String,
    generation: u64,
    handle: JoinHandle<()>,
}

impl PreviewTicket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait until the call has finished and its result has been applied or
    /// discarded.
    pub async fn settled(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(key = %self.key, error = %e, "Preview task panicked");
        }
    }
}

struct Inner {
    client: Arc<dyn InferenceClient>,
    prompts: Arc<dyn PreviewPromptSource>,
    retry: RetryPolicy,
    entries: Mutex<HashMap<String, Slot>>,
    next_generation: AtomicU64,
    limiter: Option<Semaphore>,
    events_tx: UnboundedSender<Event>,
}

/// Registry of preview generations, keyed by an opaque string.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct PreviewRegistry {
    inner: Arc<Inner>,
}

impl PreviewRegistry {
    /// Create an empty registry.
    ///
    /// # Arguments
    ///
    /// * `client` - Inference backend used for generation calls
    /// * `prompts` - Builds the request payload for a key
    /// * `retry` - Retry policy for each generation call
    /// * `max_in_flight` - Optional cap on simultaneous generation calls,
    ///   clamped to `1..=Semaphore::MAX_PERMITS`
    /// * `events_tx` - Channel for entry change events
    pub fn new(
        client: Arc<dyn InferenceClient>,
        prompts: Arc<dyn PreviewPromptSource>,
        retry: RetryPolicy,
        max_in_flight: Option<usize>,
        events_tx: UnboundedSender<Event>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                prompts,
                retry,
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                limiter: max_in_flight.map(|limit| Semaphore::new(clamp_limit(limit))),
                events_tx,
            }),
        }
    }

    /// Request a preview for `key`.
    ///
    /// Returns `None` without doing anything if `key` is already loading.
    /// Otherwise the entry is (re)created as `Loading` and a generation call
    /// is launched in the background.
    pub async fn request(&self, key: &str) -> Option<PreviewTicket> {
        let mut entries = self.inner.entries.lock().await;
        if entries.get(key).is_some_and(|slot| slot.entry.is_loading()) {
            tracing::debug!(key, "Preview already loading, ignoring request");
            return None;
        }
        Some(self.launch(&mut entries, key))
    }

    /// Request previews for every key that is absent or in `Error`.
    ///
    /// Keys that are loading or already have a preview are left untouched.
    /// All launched calls run concurrently.
    pub async fn request_bulk<I, K>(&self, keys: I) -> Vec<PreviewTicket>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut entries = self.inner.entries.lock().await;
        let mut tickets = Vec::new();

        for key in keys {
            let key = key.as_ref();
            let eligible = match entries.get(key) {
                None => true,
                Some(slot) => matches!(slot.entry, PreviewEntry::Error { .. }),
            };
            if eligible {
                tickets.push(self.launch(&mut entries, key));
            }
        }

        tracing::info!(launched = tickets.len(), "Bulk preview request");
        tickets
    }

    /// Re-request a failed preview. No-op unless `key` is in `Error`.
    pub async fn retry(&self, key: &str) -> Option<PreviewTicket> {
        let mut entries = self.inner.entries.lock().await;
        match entries.get(key) {
            Some(slot) if matches!(slot.entry, PreviewEntry::Error { .. }) => {
                Some(self.launch(&mut entries, key))
            }
            _ => {
                tracing::debug!(key, "Retry ignored, preview is not in error");
                None
            }
        }
    }

    /// Remove the entry for `key` whatever its status.
    ///
    /// An in-flight call is not aborted; its result is dropped on arrival.
    /// Returns whether an entry was removed.
    pub async fn revert(&self, key: &str) -> bool {
        let removed = self.inner.entries.lock().await.remove(key).is_some();
        if removed {
            tracing::info!(key, "Preview reverted");
            let _ = self.inner.events_tx.send(Event::PreviewRemoved {
                key: key.to_string(),
            });
        }
        removed
    }

    /// Remove every entry. In-flight results are dropped on arrival.
    ///
    /// Returns the number of entries removed. Nothing is announced when the
    /// registry was already empty.
    pub async fn clear_all(&self) -> usize {
        let removed = {
            let mut entries = self.inner.entries.lock().await;
            let count = entries.len();
            entries.clear();
            count
        };
        if removed > 0 {
            tracing::info!(removed, "Previews cleared");
            let _ = self.inner.events_tx.send(Event::PreviewsCleared);
        }
        removed
    }

    /// Point-in-time copy of every entry, ordered by key.
    pub async fn snapshot(&self) -> BTreeMap<String, PreviewEntry> {
        self.inner
            .entries
            .lock()
            .await
            .iter()
            .map(|(key, slot)| (key.clone(), slot.entry.clone()))
            .collect()
    }

    pub async fn get(&self, key: &str) -> Option<PreviewEntry> {
        self.inner
            .entries
            .lock()
            .await
            .get(key)
            .map(|slot| slot.entry.clone())
    }

    /// Number of entries currently `Loading`.
    pub async fn loading_count(&self) -> usize {
        self.inner
            .entries
            .lock()
            .await
            .values()
            .filter(|slot| slot.entry.is_loading())
            .count()
    }

    fn launch(&self, entries: &mut HashMap<String, Slot>, key: &str) -> PreviewTicket {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        entries.insert(
            key.to_string(),
            Slot {
                generation,
                entry: PreviewEntry::Loading,
            },
        );
        let _ = self.inner.events_tx.send(Event::PreviewUpdated {
            key: key.to_string(),
            entry: PreviewEntry::Loading,
        });
        tracing::debug!(key, generation, "Preview launched");

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move { inner.generate(owned_key, generation).await });

        PreviewTicket {
            key: key.to_string(),
            generation,
            handle,
        }
    }
}

fn clamp_limit(limit: usize) -> usize {
    let clamped = limit.clamp(1, Semaphore::MAX_PERMITS);
    if clamped != limit {
        tracing::warn!(requested = limit, used = clamped, "Preview concurrency limit clamped");
    }
    clamped
}

impl Inner {
    async fn is_live(&self, key: &str, generation: u64) -> bool {
        self.entries
            .lock()
            .await
            .get(key)
            .is_some_and(|slot| slot.generation == generation)
    }

    async fn generate(&self, key: String, generation: u64) {
        let _permit = match &self.limiter {
            Some(limiter) => {
                let permit = limiter.acquire().await.ok();
                // Skip the call entirely if the entry went away while queued.
                if !self.is_live(&key, generation).await {
                    tracing::debug!(key = %key, generation, "Preview dropped before launch");
                    return;
                }
                permit
            }
            None => None,
        };

        let request = self.prompts.request_for(&key);
        let result = with_retry(&self.retry, "generate_preview", || {
            self.client.generate_preview(&request)
        })
        .await;

        let entry = match result {
            Ok(image) => PreviewEntry::Success {
                image_url: image.to_data_url(),
            },
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Preview generation failed");
                PreviewEntry::Error {
                    error: e.to_string(),
                }
            }
        };

        let mut entries = self.entries.lock().await;
        match entries.get_mut(&key) {
            Some(slot) if slot.generation == generation => {
                slot.entry = entry.clone();
                let _ = self.events_tx.send(Event::PreviewUpdated { key, entry });
            }
            _ => {
                tracing::debug!(key = %key, generation, "Dropping stale preview result");
            }
        }
    }
}
