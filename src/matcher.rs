//! Best-match search and merge.
//!
//! Every primary record is scored against every candidate in index order.
//! A candidate replaces the current best only with a strictly higher score
//! that also clears the threshold, so among equal scores the earliest
//! candidate wins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::config::MergeConfig;
use crate::errors::{MergeError, MergeResult};
use crate::index::CandidateIndex;
use crate::ingest::apply_limit;
use crate::models::{
    MatchCandidate, MatchDecision, MergeOutcome, MergeStats, MergedRecord, NormalizedQuery,
    PrimaryRecord, ScoreBreakdown, ScoredMatch, SecondaryRecord, ANNOUNCEMENT_FIELD,
    ANNOUNCEMENT_URL_FIELD, IMAGES_FIELD,
};
use crate::normalize::Normalizer;
use crate::progress::Progress;
use crate::scoring::Scorer;

/// Log-only progress interval (records)
const PROGRESS_LOG_INTERVAL: u64 = 1_000;

/// Per-record result of the parallel pass
struct RecordResult {
    record: MergedRecord,
    matched: Option<(usize, f64)>,
    best_rejected: Option<f64>,
}

pub struct Matcher<'a> {
    normalizer: &'a Normalizer,
    index: &'a CandidateIndex,
    scorer: Scorer,
    threshold: f64,
    low_confidence_margin: f64,
    default_announcement: String,
}

impl<'a> Matcher<'a> {
    pub fn new(config: &MergeConfig, normalizer: &'a Normalizer, index: &'a CandidateIndex) -> Self {
        Self {
            normalizer,
            index,
            scorer: Scorer::new(config),
            threshold: config.match_threshold,
            low_confidence_margin: config.low_confidence_margin,
            default_announcement: config.default_announcement.clone(),
        }
    }

    pub fn query(&self, record: &PrimaryRecord) -> NormalizedQuery {
        self.normalizer.primary(record)
    }

    /// Find the best candidate for one query.
    pub fn decide(&self, query: &NormalizedQuery) -> MatchDecision<'a> {
        let index: &'a CandidateIndex = self.index;
        let mut best: Option<ScoredMatch<'a>> = None;
        let mut best_score = 0.0;
        let mut highest: Option<f64> = None;

        for (_, candidate) in index.lookup_all() {
            let score = self.scorer.score(query, candidate);
            highest = Some(highest.map_or(score, |h: f64| h.max(score)));

            if score > best_score && score >= self.threshold {
                best_score = score;
                best = Some(ScoredMatch { candidate, score });
            }
        }

        match best {
            Some(found) => MatchDecision::Matched(found),
            None => MatchDecision::Unmatched {
                best_rejected: highest,
            },
        }
    }

    /// Every candidate with its score breakdown, best first. Ties keep index order.
    pub fn rank(&self, query: &NormalizedQuery) -> Vec<(&'a MatchCandidate, ScoreBreakdown)> {
        let index: &'a CandidateIndex = self.index;
        let mut ranked: Vec<_> = index
            .lookup_all()
            .map(|(_, candidate)| (candidate, self.scorer.breakdown(query, candidate)))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.total
                .partial_cmp(&a.1.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    /// Primary record plus enrichment fields from the match, if any.
    ///
    /// Never removes or overwrites a primary field: if the primary record
    /// already carries an enrichment key, its own value stays.
    pub fn merge_record(&self, record: &PrimaryRecord, decision: &MatchDecision<'_>) -> MergedRecord {
        let mut merged = record.fields.clone();
        let Some(found) = decision.matched() else {
            return merged;
        };
        let candidate = found.candidate;

        let announcement = candidate
            .announcement
            .clone()
            .unwrap_or_else(|| self.default_announcement.clone());
        attach(&mut merged, ANNOUNCEMENT_FIELD, Value::String(announcement));

        let images = candidate.images.iter().cloned().map(Value::String).collect();
        attach(&mut merged, IMAGES_FIELD, Value::Array(images));

        if let Some(url) = &candidate.url {
            attach(&mut merged, ANNOUNCEMENT_URL_FIELD, Value::String(url.clone()));
        }

        merged
    }

    fn process(&self, record: &PrimaryRecord) -> RecordResult {
        let query = self.query(record);
        let decision = self.decide(&query);
        let merged = self.merge_record(record, &decision);

        match decision {
            MatchDecision::Matched(found) => {
                log::debug!(
                    "'{}' matched secondary record {} (score {:.1})",
                    query.company,
                    found.candidate.position,
                    found.score
                );
                RecordResult {
                    record: merged,
                    matched: Some((found.candidate.position, found.score)),
                    best_rejected: None,
                }
            }
            MatchDecision::Unmatched { best_rejected } => RecordResult {
                record: merged,
                matched: None,
                best_rejected,
            },
        }
    }

    /// Run the full pass over the primary source.
    ///
    /// Records are processed in parallel; the output keeps primary order and
    /// has exactly one record per input record.
    pub fn reconcile(&self, records: &[PrimaryRecord], progress: &Progress) -> MergeOutcome {
        let start = Instant::now();
        let total = records.len() as u64;
        let pb = progress.bar(total, "Matching recalls");
        let done = AtomicU64::new(0);

        let results: Vec<RecordResult> = records
            .par_iter()
            .map(|record| {
                let result = self.process(record);
                pb.inc(1);
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress.log("Matching", current, total, PROGRESS_LOG_INTERVAL);
                result
            })
            .collect();

        let mut stats = MergeStats {
            primary_records: records.len(),
            secondary_records: self.index.source_len(),
            index_keys: self.index.key_count(),
            key_collisions: self.index.collisions(),
            ..Default::default()
        };

        let mut used: FxHashSet<usize> = FxHashSet::default();
        let mut merged_records = Vec::with_capacity(results.len());
        for result in results {
            match result.matched {
                Some((position, score)) => {
                    stats.merged += 1;
                    used.insert(position);
                    if score < self.threshold + self.low_confidence_margin {
                        stats.low_confidence_matches += 1;
                    }
                }
                None => {
                    stats.unmatched += 1;
                    if result
                        .best_rejected
                        .is_some_and(|s| s >= self.threshold - self.low_confidence_margin)
                    {
                        stats.near_misses += 1;
                    }
                }
            }
            merged_records.push(result.record);
        }
        stats.unused_secondary = stats.secondary_records - used.len();
        stats.elapsed_seconds = start.elapsed().as_secs_f64();

        pb.finish_with_message(format!(
            "Matching: merged {} of {} recalls",
            stats.merged, stats.primary_records
        ));
        log::info!(
            "Merged {} recalls, {} passed through unmatched",
            stats.merged,
            stats.unmatched
        );

        MergeOutcome {
            records: merged_records,
            stats,
        }
    }
}

fn attach(merged: &mut MergedRecord, field: &str, value: Value) {
    if merged.contains_key(field) {
        log::debug!("Primary record already has '{}'; keeping its value", field);
        return;
    }
    merged.insert(field.to_string(), value);
}

// ============================================================================
// Entry Points
// ============================================================================

/// Reconcile two in-memory sources with the given configuration.
pub fn reconcile(
    primary: &[PrimaryRecord],
    secondary: &[SecondaryRecord],
    config: &MergeConfig,
) -> MergeResult<MergeOutcome> {
    reconcile_with_progress(primary, secondary, config, &Progress::quiet())
}

pub fn reconcile_with_progress(
    primary: &[PrimaryRecord],
    secondary: &[SecondaryRecord],
    config: &MergeConfig,
    progress: &Progress,
) -> MergeResult<MergeOutcome> {
    config.validate()?;

    let primary = apply_limit(primary, config.record_limit);
    let secondary = apply_limit(secondary, config.record_limit);
    if let Some(limit) = config.record_limit {
        log::info!(
            "Record limit {}: using {} primary and {} secondary records",
            limit,
            primary.len(),
            secondary.len()
        );
    }

    let normalizer = Normalizer::new(config)?;

    let spinner = progress.spinner("Building candidate index");
    let index = CandidateIndex::build(secondary, &normalizer, config.collisions);
    spinner.finish_with_message(format!(
        "Candidate index: {} candidates under {} keys",
        index.len(),
        index.key_count()
    ));

    let matcher = Matcher::new(config, &normalizer, &index);
    if config.workers > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .map_err(|e| MergeError::Configuration(format!("failed to build worker pool: {e}")))?;
        Ok(pool.install(|| matcher.reconcile(primary, progress)))
    } else {
        Ok(matcher.reconcile(primary, progress))
    }
}
