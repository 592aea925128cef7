//! Core data models for recall reconciliation.
//!
//! This module contains the record shapes handed over by the two fetchers,
//! the normalized views the matcher works on, and run statistics.

use std::fmt;
use std::path::Path;

use rustc_hash::FxHashSet;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{MergeError, MergeResult};

// ============================================================================
// Field Names
// ============================================================================

/// Source A (enforcement API) fields read by the matcher
pub const PRIMARY_COMPANY_FIELD: &str = "recalling_firm";
pub const PRIMARY_PRODUCT_FIELD: &str = "product_description";
pub const PRIMARY_REASON_FIELD: &str = "reason_for_recall";

/// Source B (announcement site) fields
pub const SECONDARY_DETAILS_FIELD: &str = "product_details";
pub const SECONDARY_COMPANY_FIELD: &str = "Company Name";
pub const SECONDARY_PRODUCT_FIELD: &str = "Product Description";
pub const SECONDARY_REASON_FIELD: &str = "Reason for Announcement";
pub const SECONDARY_URL_FIELD: &str = "url";

/// Enrichment fields attached to merged records (the first two share their
/// name with the source B fields they are copied from)
pub const ANNOUNCEMENT_FIELD: &str = "company_announcement";
pub const IMAGES_FIELD: &str = "product_images";
pub const ANNOUNCEMENT_URL_FIELD: &str = "fda_announcement_url";

// ============================================================================
// Type Aliases
// ============================================================================

/// An ordered JSON object; source field order survives the merge.
pub type Fields = Map<String, Value>;

/// Output record: the primary record plus any enrichment fields.
pub type MergedRecord = Fields;

pub type KeywordSet = FxHashSet<String>;

// ============================================================================
// Source Records
// ============================================================================

/// Record from the primary (authoritative) source.
///
/// The three matched fields are extracted up front; `fields` holds the whole
/// original object, passthrough fields included.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimaryRecord {
    pub company: String,
    pub product: String,
    pub reason: String,
    pub fields: Fields,
}

/// Record from the secondary (enrichment) source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SecondaryRecord {
    pub company: String,
    pub product: String,
    pub reason: String,
    pub url: Option<String>,
    pub announcement: Option<String>,
    pub images: Vec<String>,
}

/// Records produced by ingestion, with the number of fields that had to be
/// defaulted along the way.
#[derive(Clone, Debug, Default)]
pub struct Ingested<T> {
    pub records: Vec<T>,
    pub missing_fields: usize,
}

// ============================================================================
// Normalized Views
// ============================================================================

/// (company_norm, product_norm) grouping key
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NormalizedKey {
    pub company: String,
    pub product: String,
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.company, self.product)
    }
}

/// Normalized form of a primary record, used as the scoring query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedQuery {
    pub company: String,
    pub product: String,
    pub keywords: KeywordSet,
}

/// Secondary record as seen by the scorer.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchCandidate {
    /// Position of the record in the secondary source
    pub position: usize,
    pub key: NormalizedKey,
    pub keywords: KeywordSet,
    pub url: Option<String>,
    pub announcement: Option<String>,
    pub images: Vec<String>,
}

impl MatchCandidate {
    pub fn company(&self) -> &str {
        &self.key.company
    }

    pub fn product(&self) -> &str {
        &self.key.product
    }
}

// ============================================================================
// Scoring Models
// ============================================================================

/// Per-field scores before weighting, plus the weighted total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub company: f64,
    pub product: f64,
    pub keywords: f64,
    pub total: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredMatch<'a> {
    pub candidate: &'a MatchCandidate,
    pub score: f64,
}

/// Outcome of the best-match search for one primary record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MatchDecision<'a> {
    Matched(ScoredMatch<'a>),
    /// No candidate reached the threshold. `best_rejected` is the highest
    /// score seen, if there were any candidates at all.
    Unmatched { best_rejected: Option<f64> },
}

impl<'a> MatchDecision<'a> {
    pub fn matched(&self) -> Option<&ScoredMatch<'a>> {
        match self {
            MatchDecision::Matched(m) => Some(m),
            MatchDecision::Unmatched { .. } => None,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Run statistics, reported at the end of every run.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct MergeStats {
    pub primary_records: usize,
    pub secondary_records: usize,
    pub index_keys: usize,
    pub key_collisions: usize,

    pub merged: usize,
    pub unmatched: usize,
    /// Matches scoring below threshold + margin
    pub low_confidence_matches: usize,
    /// Unmatched records whose best score was within margin of the threshold
    pub near_misses: usize,
    /// Secondary records never selected as a best match
    pub unused_secondary: usize,

    pub missing_fields: usize,

    pub elapsed_seconds: f64,
}

impl MergeStats {
    /// Merged records as a percentage of primary records
    pub fn match_rate(&self) -> f64 {
        if self.primary_records == 0 {
            0.0
        } else {
            100.0 * self.merged as f64 / self.primary_records as f64
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    pub fn write_to_file(&self, path: &Path) -> MergeResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| MergeError::io(path, e))?;
        Ok(())
    }
}

/// Result of a full reconciliation pass.
#[derive(Clone, Debug, Default)]
pub struct MergeOutcome {
    /// One record per primary record, in primary order
    pub records: Vec<MergedRecord>,
    pub stats: MergeStats,
}
