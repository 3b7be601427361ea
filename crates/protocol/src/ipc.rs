//! Events pushed from the core to the UI layer.
//!
//! The core never calls into the renderer. It publishes [`Event`]s on a
//! channel and the UI re-reads whatever snapshot it needs.
//!
//! Uses tagged enum serialization for TypeScript compatibility:
//! ```json
//! {
//!   "type": "previewUpdated",
//!   "payload": { "key": "pose-03", "entry": { "status": "LOADING" } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ingestion_models::StageKind;
use crate::preview_models::PreviewEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// An upload slot moved to a new stage.
    IngestionStageChanged { slot: String, stage: StageKind },

    /// An upload slot reached `Failed`. Sent once per failed submission.
    IngestionFailed { slot: String, message: String },

    /// A preview entry was created or changed.
    PreviewUpdated { key: String, entry: PreviewEntry },

    /// A preview entry was reverted.
    PreviewRemoved { key: String },

    /// Every preview entry was cleared.
    PreviewsCleared,
}
