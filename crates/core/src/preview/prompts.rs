//! Request payloads for preview keys.

use crate::inference::{ImageHandle, PreviewRequest};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Builds the generation payload for a registry key.
pub trait PreviewPromptSource: Send + Sync {
    fn request_for(&self, key: &str) -> PreviewRequest;
}

/// Fixed key-to-prompt table with a shared garment reference image.
///
/// Keys without an entry fall back to the default prompt.
pub struct PromptTable {
    prompts: HashMap<String, String>,
    default_prompt: String,
    reference_image: RwLock<Option<ImageHandle>>,
}

impl PromptTable {
    pub fn new(default_prompt: impl Into<String>) -> Self {
        Self {
            prompts: HashMap::new(),
            default_prompt: default_prompt.into(),
            reference_image: RwLock::new(None),
        }
    }

    pub fn with_prompt(mut self, key: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.prompts.insert(key.into(), prompt.into());
        self
    }

    pub fn prompt_for(&self, key: &str) -> &str {
        self.prompts
            .get(key)
            .map(String::as_str)
            .unwrap_or(&self.default_prompt)
    }

    /// Set the garment image sent with every subsequent request.
    ///
    /// Requests already in flight keep the image they were built with.
    pub fn set_reference_image(&self, image: Option<ImageHandle>) {
        *self
            .reference_image
            .write()
            .unwrap_or_else(PoisonError::into_inner) = image;
    }

    fn reference_image(&self) -> Option<ImageHandle> {
        self.reference_image
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PreviewPromptSource for PromptTable {
    fn request_for(&self, key: &str) -> PreviewRequest {
        PreviewRequest {
            key: key.to_string(),
            prompt: self.prompt_for(key).to_string(),
            reference_image: self.reference_image(),
        }
    }
}
