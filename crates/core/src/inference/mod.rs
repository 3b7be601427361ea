//! Remote inference abstraction.
//!
//! This module provides the `InferenceClient` trait (Adapter Pattern) that
//! both the ingestion pipeline and the preview registry call through, plus
//! its HTTP and mock implementations.

pub mod adapters;
pub mod base;

pub use adapters::{HttpInferenceClient, MockInference, MockOp};
pub use base::{ImageHandle, InferenceClient, InferenceError, PreviewRequest};
