//! # studio-core
//!
//! Task orchestration for garment-studio.
//!
//! This crate provides:
//! - An inference client abstraction with HTTP and mock adapters
//! - A bounded retry wrapper for remote calls
//! - The garment ingestion pipeline, one state machine per upload slot
//! - A keyed registry of concurrent preview generations
//! - Configuration loading from the `.studio/` directory
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`inference`]: InferenceClient trait and adapter implementations
//! - [`retry`]: Retry wrapper
//! - [`ingest`]: Ingestion pipeline and slot state
//! - [`preview`]: Preview registry
//! - [`studio`]: Session facade owning slots and the registry

pub mod config;
pub mod inference;
pub mod ingest;
pub mod preview;
pub mod retry;
pub mod studio;

pub use studio::Studio;
