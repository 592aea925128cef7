//! Food-recall reconciliation library - shared modules for all binaries.
//!
//! Links enforcement-API recall records to announcement-site records by
//! fuzzy multi-field similarity and merges the announcement details in.

pub mod config;
pub mod errors;
pub mod index;
pub mod ingest;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod safety;
pub mod scoring;

pub use config::MergeConfig;
pub use errors::{MergeError, MergeResult};
pub use matcher::{reconcile, reconcile_with_progress, Matcher};
pub use models::{MergeOutcome, MergeStats, PrimaryRecord, SecondaryRecord};
