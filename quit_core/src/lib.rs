#![forbid(unsafe_code)]

//! Core domain model and business logic for the Quitlog tracker.
//!
//! This crate provides:
//! - Domain types (settings, craving events, derived progress)
//! - Trigger/location vocabulary
//! - Storage boundary (table store trait, CSV and in-memory stores)
//! - Settings accessor and craving event log
//! - Progress engine (recovery stages, ranks)

pub mod types;
pub mod error;
pub mod vocabulary;
pub mod config;
pub mod logging;
pub mod store;
pub mod csv_store;
pub mod settings;
pub mod event_log;
pub mod stats;
pub mod progress;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use vocabulary::{default_vocabulary, Vocabulary};
pub use config::Config;
pub use store::{MemoryTableStore, Table, TableStore};
pub use csv_store::CsvTableStore;
pub use settings::{resolve_settings, SettingsStore};
pub use event_log::{aggregate_by_trigger, EventLog};
pub use stats::{aggregate_by_location, summarize, LogSummary};
pub use progress::{compute_progress, compute_progress_with, ProgressTables};
