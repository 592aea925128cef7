//! Matcher configuration.
//!
//! A `MergeConfig` is built once per run (defaults, optionally overlaid by a
//! TOML file and CLI flags) and handed to every component by reference.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{MergeError, MergeResult};

// ============================================================================
// Defaults
// ============================================================================

/// Minimum total score to accept a match
pub const DEFAULT_MATCH_THRESHOLD: f64 = 70.0;

/// Points awarded per shared reason keyword, before weighting
pub const DEFAULT_KEYWORD_POINTS: f64 = 10.0;

pub const DEFAULT_MIN_KEYWORD_LEN: usize = 4;

/// Width of the band around the threshold used for low-confidence and
/// near-miss accounting
pub const DEFAULT_LOW_CONFIDENCE_MARGIN: f64 = 10.0;

/// Cap used by the legacy merge script; kept for reference, never applied
/// unless configured.
pub const LEGACY_RECORD_LIMIT: usize = 500;

pub const DEFAULT_LEGAL_SUFFIXES: &[&str] = &[
    "Inc",
    "LLC",
    "Ltd",
    "Co",
    "Corporation",
    "Company",
    "Limited",
];

pub const DEFAULT_PRODUCT_LABEL: &str = "Product Description";

pub const DEFAULT_ANNOUNCEMENT: &str = "No announcement found";

// ============================================================================
// Policies
// ============================================================================

/// Field weights for the combined score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub company: f64,
    pub product: f64,
    pub keywords: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            company: 0.4,
            product: 0.4,
            keywords: 0.2,
        }
    }
}

/// Similarity metric used for the company-name component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyMetric {
    /// Indel ratio, 2*LCS / (|a| + |b|)
    #[default]
    Indel,
    Levenshtein,
    JaroWinkler,
}

/// What product normalization does with characters outside `[a-z0-9\s]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunctuationPolicy {
    /// Delete them; adjacent tokens may fuse ("red&white" -> "redwhite").
    #[default]
    Strip,
    /// Replace each one with a single space.
    Separator,
}

/// How the candidate index treats secondary records sharing a normalized key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Every record is kept and scored.
    #[default]
    KeepAll,
    /// The latest record replaces the earlier one in the earlier one's slot.
    LastWins,
}

// ============================================================================
// MergeConfig
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Truncate both sources to this many records (None = no cap).
    pub record_limit: Option<usize>,
    pub match_threshold: f64,
    pub weights: ScoreWeights,
    pub keyword_points: f64,
    pub min_keyword_len: usize,
    pub legal_suffixes: Vec<String>,
    pub product_label: String,
    pub punctuation: PunctuationPolicy,
    pub collisions: CollisionPolicy,
    pub company_metric: CompanyMetric,
    pub default_announcement: String,
    pub low_confidence_margin: f64,
    /// Rayon worker threads (0 = rayon default).
    pub workers: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            record_limit: None,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            weights: ScoreWeights::default(),
            keyword_points: DEFAULT_KEYWORD_POINTS,
            min_keyword_len: DEFAULT_MIN_KEYWORD_LEN,
            legal_suffixes: DEFAULT_LEGAL_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            product_label: DEFAULT_PRODUCT_LABEL.to_string(),
            punctuation: PunctuationPolicy::default(),
            collisions: CollisionPolicy::default(),
            company_metric: CompanyMetric::default(),
            default_announcement: DEFAULT_ANNOUNCEMENT.to_string(),
            low_confidence_margin: DEFAULT_LOW_CONFIDENCE_MARGIN,
            workers: 0,
        }
    }
}

impl MergeConfig {
    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(text: &str) -> MergeResult<Self> {
        let config: MergeConfig = toml::from_str(text)
            .map_err(|e| MergeError::Configuration(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> MergeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MergeError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> MergeResult<()> {
        if !self.match_threshold.is_finite() || self.match_threshold < 0.0 {
            return Err(MergeError::Configuration(format!(
                "match_threshold must be a finite, non-negative number (got {})",
                self.match_threshold
            )));
        }

        let w = &self.weights;
        for (name, value) in [
            ("company", w.company),
            ("product", w.product),
            ("keywords", w.keywords),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MergeError::Configuration(format!(
                    "weight '{name}' must be finite and non-negative (got {value})"
                )));
            }
        }
        if w.company + w.product + w.keywords == 0.0 {
            return Err(MergeError::Configuration(
                "at least one score weight must be positive".to_string(),
            ));
        }

        if !self.keyword_points.is_finite() || self.keyword_points < 0.0 {
            return Err(MergeError::Configuration(format!(
                "keyword_points must be finite and non-negative (got {})",
                self.keyword_points
            )));
        }
        if self.min_keyword_len == 0 {
            return Err(MergeError::Configuration(
                "min_keyword_len must be at least 1".to_string(),
            ));
        }
        if self.record_limit == Some(0) {
            return Err(MergeError::Configuration(
                "record_limit of 0 would discard every record; omit it to disable the cap"
                    .to_string(),
            ));
        }
        if let Some(empty) = self.legal_suffixes.iter().position(|s| s.trim().is_empty()) {
            return Err(MergeError::Configuration(format!(
                "legal_suffixes[{empty}] is empty"
            )));
        }
        if !self.low_confidence_margin.is_finite() || self.low_confidence_margin < 0.0 {
            return Err(MergeError::Configuration(format!(
                "low_confidence_margin must be finite and non-negative (got {})",
                self.low_confidence_margin
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MergeConfig::default();
        assert_eq!(config.match_threshold, 70.0);
        assert_eq!(config.weights, ScoreWeights { company: 0.4, product: 0.4, keywords: 0.2 });
        assert_eq!(config.min_keyword_len, 4);
        assert_eq!(config.record_limit, None);
        assert_eq!(config.legal_suffixes.len(), 7);
        assert_eq!(config.collisions, CollisionPolicy::KeepAll);
        assert_eq!(config.punctuation, PunctuationPolicy::Strip);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MergeConfig::from_toml_str(
            r#"
            match_threshold = 80.0
            record_limit = 500
            collisions = "last_wins"

            [weights]
            keywords = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.match_threshold, 80.0);
        assert_eq!(config.record_limit, Some(LEGACY_RECORD_LIMIT));
        assert_eq!(config.collisions, CollisionPolicy::LastWins);
        assert_eq!(config.weights.company, 0.4);
        assert_eq!(config.weights.keywords, 0.5);
        assert_eq!(config.default_announcement, DEFAULT_ANNOUNCEMENT);
    }

    #[test]
    fn test_invalid_toml() {
        let result = MergeConfig::from_toml_str("match_threshold = \"high\"");
        assert!(matches!(result, Err(MergeError::Configuration(_))));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = MergeConfig::default();
        config.weights = ScoreWeights { company: 0.0, product: 0.0, keywords: 0.0 };
        assert!(config.validate().is_err());

        let mut config = MergeConfig::default();
        config.weights.product = -0.1;
        assert!(config.validate().is_err());

        let mut config = MergeConfig::default();
        config.match_threshold = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = MergeConfig::default();
        config.record_limit = Some(0);
        assert!(config.validate().is_err());

        let mut config = MergeConfig::default();
        config.min_keyword_len = 0;
        assert!(config.validate().is_err());

        let mut config = MergeConfig::default();
        config.legal_suffixes.push("  ".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("legal_suffixes[7]"));
    }

    #[test]
    fn test_missing_file() {
        let result = MergeConfig::from_toml_file(Path::new("/nonexistent/recall-merge.toml"));
        assert!(matches!(result, Err(MergeError::Io { .. })));
    }
}
