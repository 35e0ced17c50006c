//! Weather Ingest Library
//!
//! Validates sensor batches delivered by the function runtime and writes
//! each sample to the readings store.

pub mod config;
pub mod event;
pub mod handlers;
pub mod ingestion;

// Re-export commonly used types
pub use config::IngestConfig;
pub use event::{EventParser, IngestEvent};
pub use ingestion::{IngestReport, IngestionService};
