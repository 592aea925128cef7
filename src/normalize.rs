//! Text normalization for recall matching.
//! Applied identically to both sources before any comparison.
//!
//! CRITICAL: normalized strings feed the scorer directly; any change here
//! shifts every score. Run tests after changes.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{MergeConfig, PunctuationPolicy};
use crate::errors::{MergeError, MergeResult};
use crate::models::{KeywordSet, NormalizedKey, NormalizedQuery, PrimaryRecord, SecondaryRecord};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Maximal runs of ASCII letters (applied after lowercasing).
static LETTER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+").unwrap());

static DEFAULT_NORMALIZER: Lazy<Normalizer> = Lazy::new(|| {
    Normalizer::new(&MergeConfig::default()).expect("default normalizer config is valid")
});

/// Build the legal-suffix pattern: whole words, case-insensitive, with an
/// optional trailing period consumed along with the word.
fn suffix_pattern(suffixes: &[String]) -> MergeResult<Option<Regex>> {
    if suffixes.is_empty() {
        return Ok(None);
    }
    let alternatives: Vec<String> = suffixes
        .iter()
        .map(|s| regex::escape(s.trim().trim_end_matches('.')))
        .collect();
    let pattern = format!(r"(?i)\b(?:{})\b\.?", alternatives.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| MergeError::Configuration(format!("invalid legal suffix list: {e}")))
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Canonicalizes company names, product descriptions and recall reasons.
/// All methods are pure and accept any input, empty included.
#[derive(Clone, Debug)]
pub struct Normalizer {
    suffixes: Option<Regex>,
    product_label: String,
    punctuation: PunctuationPolicy,
    min_keyword_len: usize,
}

impl Normalizer {
    pub fn new(config: &MergeConfig) -> MergeResult<Self> {
        Ok(Self {
            suffixes: suffix_pattern(&config.legal_suffixes)?,
            product_label: config.product_label.clone(),
            punctuation: config.punctuation,
            min_keyword_len: config.min_keyword_len,
        })
    }

    /// Strip legal-entity suffixes, straighten curly apostrophes, trim, lowercase.
    /// e.g., "Acme Foods, Inc." → "acme foods,"
    pub fn company(&self, raw: &str) -> String {
        let stripped = match &self.suffixes {
            Some(re) => re.replace_all(raw, ""),
            None => Cow::Borrowed(raw),
        };
        stripped
            .replace(['\u{2018}', '\u{2019}'], "'")
            .trim()
            .to_lowercase()
    }

    /// Drop the leading "Product Description" label, trim, lowercase, then
    /// remove everything but `[a-z0-9]` and whitespace.
    /// e.g., "Product Description: Peanut Butter Cookies" → " peanut butter cookies"
    ///
    /// The leading space is kept: the label's colon is removed after trimming.
    pub fn product(&self, raw: &str) -> String {
        let unlabeled = match raw.trim_start().strip_prefix(self.product_label.as_str()) {
            Some(rest) if !self.product_label.is_empty() => rest,
            _ => raw,
        };
        let lowered = unlabeled.trim().to_lowercase();

        let mut result = String::with_capacity(lowered.len());
        for c in lowered.chars() {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
                result.push(c);
            } else if self.punctuation == PunctuationPolicy::Separator {
                result.push(' ');
            }
        }
        result
    }

    /// Lowercase and collect every maximal run of letters of at least
    /// `min_keyword_len` characters.
    pub fn keywords(&self, raw: &str) -> KeywordSet {
        let lowered = raw.to_lowercase();
        LETTER_RUN
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|word| word.len() >= self.min_keyword_len)
            .map(str::to_string)
            .collect()
    }

    pub fn key(&self, company: &str, product: &str) -> NormalizedKey {
        NormalizedKey {
            company: self.company(company),
            product: self.product(product),
        }
    }

    pub fn primary(&self, record: &PrimaryRecord) -> NormalizedQuery {
        NormalizedQuery {
            company: self.company(&record.company),
            product: self.product(&record.product),
            keywords: self.keywords(&record.reason),
        }
    }

    pub fn secondary_key(&self, record: &SecondaryRecord) -> NormalizedKey {
        self.key(&record.company, &record.product)
    }
}

// ============================================================================
// DEFAULT-CONFIG SHORTHANDS
// ============================================================================

/// `Normalizer::company` with the default suffix list.
pub fn normalize_company(raw: &str) -> String {
    DEFAULT_NORMALIZER.company(raw)
}

/// `Normalizer::product` with the default label and punctuation policy.
pub fn normalize_product(raw: &str) -> String {
    DEFAULT_NORMALIZER.product(raw)
}

/// `Normalizer::keywords` with the default minimum length.
pub fn extract_keywords(raw: &str) -> KeywordSet {
    DEFAULT_NORMALIZER.keywords(raw)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> KeywordSet {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_normalize_company_basic() {
        assert_eq!(normalize_company("Acme Foods, Inc."), "acme foods,");
        assert_eq!(normalize_company("Acme Foods Inc"), "acme foods");
        assert_eq!(normalize_company("GREEN VALLEY LLC"), "green valley");
        assert_eq!(normalize_company("  Smith & Sons Co.  "), "smith & sons");
        assert_eq!(normalize_company("Northern Corporation Limited"), "northern");
    }

    #[test]
    fn test_normalize_company_whole_words_only() {
        // "Co" inside "Costco" and "Inc" inside "Incredible" are not suffixes
        assert_eq!(normalize_company("Costco Wholesale"), "costco wholesale");
        assert_eq!(normalize_company("Incredible Edibles"), "incredible edibles");
        // Removal in the middle leaves the surrounding spacing alone
        assert_eq!(normalize_company("Acme Inc Foods"), "acme  foods");
    }

    #[test]
    fn test_normalize_company_apostrophes() {
        assert_eq!(normalize_company("Trader Joe\u{2019}s"), "trader joe's");
        assert_eq!(normalize_company("\u{2018}Ohana Farms"), "'ohana farms");
    }

    #[test]
    fn test_normalize_company_idempotent() {
        let samples = [
            "Acme Foods, Inc.",
            "Co.Inc. Holdings",
            "Inc",
            "  The Bakery Company Ltd.  ",
            "Trader Joe\u{2019}s Co",
            "Ben & Jerry's Homemade, LLC",
            "Acme Co..",
            "",
            "   ",
            "Fresh Express Incorporated",
        ];
        for sample in samples {
            let once = normalize_company(sample);
            assert_eq!(normalize_company(&once), once, "not a fixed point: {sample:?}");
        }
    }

    #[test]
    fn test_custom_suffix_list() {
        let config = MergeConfig {
            legal_suffixes: vec!["GmbH".to_string(), "S.A.".to_string()],
            ..Default::default()
        };
        let normalizer = Normalizer::new(&config).unwrap();
        assert_eq!(normalizer.company("Lebensmittel GmbH"), "lebensmittel");
        // Defaults no longer apply
        assert_eq!(normalizer.company("Acme Inc"), "acme inc");

        let none = Normalizer::new(&MergeConfig {
            legal_suffixes: Vec::new(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(none.company("Acme Inc"), "acme inc");
    }

    #[test]
    fn test_normalize_product_basic() {
        assert_eq!(
            normalize_product("Product Description: Peanut Butter Cookies"),
            " peanut butter cookies"
        );
        assert_eq!(normalize_product("Peanut Butter Cookies"), "peanut butter cookies");
        assert_eq!(
            normalize_product("Granola, 12 oz. (340g) bags"),
            "granola 12 oz 340g bags"
        );
    }

    #[test]
    fn test_normalize_product_fuses_tokens() {
        assert_eq!(normalize_product("Red&White Mints"), "redwhite mints");
        assert_eq!(normalize_product("Crème Brûlée"), "crme brle");
    }

    #[test]
    fn test_normalize_product_separator_policy() {
        let normalizer = Normalizer::new(&MergeConfig {
            punctuation: PunctuationPolicy::Separator,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(normalizer.product("Red&White Mints"), "red white mints");
    }

    #[test]
    fn test_normalize_product_label_only_leading() {
        assert_eq!(
            normalize_product("Cookies; see Product Description"),
            "cookies see product description"
        );
    }

    #[test]
    fn test_extract_keywords() {
        let keywords = extract_keywords(
            "The product was contaminated with Salmonella due to cross contamination",
        );
        assert_eq!(
            keywords,
            set(&["product", "contaminated", "with", "salmonella", "cross", "contamination"])
        );
        assert!(!keywords.contains("the"));
        assert!(!keywords.contains("was"));
        assert!(!keywords.contains("due"));
    }

    #[test]
    fn test_extract_keywords_runs_and_duplicates() {
        assert_eq!(
            extract_keywords("Undeclared MILK; undeclared milk (cross-contact)"),
            set(&["undeclared", "milk", "cross", "contact"])
        );
        // Digits split runs
        assert_eq!(extract_keywords("lot A1234bcde"), set(&["bcde"]));
        assert!(extract_keywords("").is_empty());
    }

    #[test]
    fn test_extract_keywords_min_len() {
        let normalizer = Normalizer::new(&MergeConfig {
            min_keyword_len: 6,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            normalizer.keywords("Listeria found in salad"),
            set(&["listeria"])
        );
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(normalize_company(""), "");
        assert_eq!(normalize_product(""), "");
        assert_eq!(normalize_product("Product Description"), "");
        let query = DEFAULT_NORMALIZER.primary(&PrimaryRecord::default());
        assert_eq!(query, NormalizedQuery::default());
    }
}
