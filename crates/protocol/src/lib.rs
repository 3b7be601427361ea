//! # studio-protocol
//!
//! Shared data models for garment-studio.
//!
//! This crate defines the structures exchanged between the orchestration core
//! and the UI layer:
//! - Garment regions and size charts returned by the inference backend
//! - Ingestion stage snapshots for each upload slot
//! - Preview registry entries
//! - Events pushed to the UI
//! - Configuration from `.studio/config.toml`
//!
//! ## Modules
//!
//! - [`region_models`]: Bounding boxes, candidate regions, size charts
//! - [`ingestion_models`]: Ingestion stages and garment drafts
//! - [`preview_models`]: Preview entries and statuses
//! - [`ipc`]: Events for Core-UI communication
//! - [`config_models`]: Configuration structures
//!
//! All types derive `TS` so the web front-end can share them.

pub mod config_models;
pub mod ingestion_models;
pub mod ipc;
pub mod preview_models;
pub mod region_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use ingestion_models::*;
pub use ipc::*;
pub use preview_models::*;
pub use region_models::*;
