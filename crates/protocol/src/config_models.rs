//! Configuration models for `.studio/config.toml`.
//!
//! Every section is optional; a missing file or section yields the defaults
//! below.
//!
//! # Example
//!
//! ```toml
//! [inference]
//! base-url = "http://localhost:8700"
//! api-key-env = "STUDIO_INFERENCE_KEY"
//! timeout-secs = 120
//!
//! [retry]
//! max-attempts = 2
//! initial-backoff-ms = 0
//!
//! [preview]
//! max-in-flight = 4
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Where the inference backend lives and how to reach it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case", default)]
pub struct InferenceConfig {
    pub base_url: String,

    /// Name of the environment variable holding a bearer token, if any.
    pub api_key_env: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8700".to_string(),
            api_key_env: None,
            timeout_secs: 120,
        }
    }
}

/// Bounded retry applied to every remote call.
///
/// The defaults give two attempts in total with no delay between them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetryConfig {
    /// Total attempts, including the first one. Must be at least 1.
    pub max_attempts: u32,

    /// Delay before the second attempt. Zero disables backoff.
    pub initial_backoff_ms: u64,

    /// Growth factor applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff_ms: 0,
            backoff_multiplier: 2.0,
        }
    }
}

/// Preview registry tuning.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case", default)]
pub struct PreviewConfig {
    /// Upper bound on simultaneous generation calls. `None` means unbounded.
    pub max_in_flight: Option<usize>,
}

/// Settings from `.studio/config.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
#[serde(default)]
pub struct StudioConfig {
    pub inference: InferenceConfig,
    pub retry: RetryConfig,
    pub preview: PreviewConfig,
}
