//! Scoring functions for recall matching.
//!
//! This module contains:
//! - Fuzzy string ratios (full and best-partial)
//! - Reason keyword overlap scoring
//! - The weighted multi-field `Scorer`

use rustc_hash::FxHashMap;

use crate::config::{CompanyMetric, MergeConfig, ScoreWeights};
use crate::models::{KeywordSet, MatchCandidate, NormalizedQuery, ScoreBreakdown};

/// A partial-ratio window above this counts as a perfect match
const PERFECT_WINDOW: f64 = 0.995;

// ============================================================================
// Longest Common Subsequence
// ============================================================================

/// Bit-parallel LCS matcher over a fixed pattern (64 pattern positions per word).
///
/// Precomputing the per-character match masks once lets the partial ratio
/// score every window of the longer string without rebuilding them.
struct LcsPattern {
    len: usize,
    words: usize,
    masks: FxHashMap<char, Vec<u64>>,
}

impl LcsPattern {
    fn new(pattern: &[char]) -> Self {
        let words = pattern.len().div_ceil(64);
        let mut masks: FxHashMap<char, Vec<u64>> = FxHashMap::default();
        for (i, &c) in pattern.iter().enumerate() {
            masks.entry(c).or_insert_with(|| vec![0; words])[i / 64] |= 1u64 << (i % 64);
        }
        Self {
            len: pattern.len(),
            words,
            masks,
        }
    }

    /// Length of the longest common subsequence of the pattern and `text`.
    fn lcs(&self, text: &[char]) -> usize {
        if self.len == 0 || text.is_empty() {
            return 0;
        }

        // V starts all ones; each zero bit left at the end is one LCS position.
        let mut v = vec![u64::MAX; self.words];
        for c in text {
            let Some(mask) = self.masks.get(c) else {
                continue;
            };
            let mut carry = 0u64;
            for (word, &m) in v.iter_mut().zip(mask.iter()) {
                let matched = *word & m;
                let (sum, c1) = word.overflowing_add(matched);
                let (sum, c2) = sum.overflowing_add(carry);
                carry = u64::from(c1 || c2);
                *word = sum | (*word - matched);
            }
        }

        let mut zeros = 0;
        for (k, word) in v.iter().enumerate() {
            let bits = (self.len - k * 64).min(64);
            let live = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            zeros += (!word & live).count_ones() as usize;
        }
        zeros
    }
}

/// Indel similarity in [0, 1]: 2 * LCS / (|a| + |b|).
fn indel_similarity(pattern: &LcsPattern, text: &[char]) -> f64 {
    let total = pattern.len + text.len();
    if total == 0 {
        return 0.0;
    }
    2.0 * pattern.lcs(text) as f64 / total as f64
}

/// Scale a [0, 1] similarity to an integer-valued percentage, rounding half to even.
fn to_percent(similarity: f64) -> f64 {
    (similarity * 100.0).round_ties_even()
}

// ============================================================================
// Matching Blocks
// ============================================================================

/// From this length on, characters occurring in more than 1% of the longer
/// string (plus one) cannot seed a matching block.
const POPULAR_MIN_LEN: usize = 200;

/// (start in a, start in b, length)
type Block = (usize, usize, usize);

/// Splits `a` against `b` into matching blocks: take the longest common
/// substring, then recurse on the pieces to its left and right.
struct BlockMatcher<'s> {
    a: &'s [char],
    b: &'s [char],
    /// Positions in `b` per character, ascending; popular characters removed
    b2j: FxHashMap<char, Vec<usize>>,
}

impl<'s> BlockMatcher<'s> {
    fn new(a: &'s [char], b: &'s [char]) -> Self {
        let mut b2j: FxHashMap<char, Vec<usize>> = FxHashMap::default();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }
        if b.len() >= POPULAR_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }
        Self { a, b, b2j }
    }

    /// Longest block inside `a[alo..ahi]` x `b[blo..bhi]`. Earliest in `a`
    /// wins, then earliest in `b`. The block is then grown over equal
    /// neighbours, popular characters included.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Block {
        let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
        let mut run_ending_at: FxHashMap<usize, usize> = FxHashMap::default();

        for i in alo..ahi {
            let mut next: FxHashMap<usize, usize> = FxHashMap::default();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let previous = match j {
                        0 => 0,
                        _ => run_ending_at.get(&(j - 1)).copied().unwrap_or(0),
                    };
                    let k = previous + 1;
                    next.insert(j, k);
                    if k > best_len {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_len = k;
                    }
                }
            }
            run_ending_at = next;
        }

        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_len += 1;
        }
        while best_i + best_len < ahi
            && best_j + best_len < bhi
            && self.a[best_i + best_len] == self.b[best_j + best_len]
        {
            best_len += 1;
        }
        (best_i, best_j, best_len)
    }

    /// All matching blocks in order, ending with the `(|a|, |b|, 0)` sentinel.
    fn blocks(&self) -> Vec<Block> {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            blocks.push((i, j, k));
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
        blocks.sort_unstable();
        blocks.push((self.a.len(), self.b.len(), 0));
        blocks
    }
}

// ============================================================================
// Fuzzy Ratios
// ============================================================================

/// Full-string similarity (0 to 100). Empty input on either side scores 0.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    to_percent(indel_similarity(&LcsPattern::new(&a_chars), &b_chars))
}

/// Best-window similarity (0 to 100).
///
/// Each matching block between the shorter and the longer string anchors a
/// window of the longer one, aligned so the block lines up with its place in
/// the shorter string. A window running past the end of the longer string is
/// clipped, not shifted back. The best window wins, so a short description
/// embedded in a longer one scores high.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (shorter, longer) = if a_chars.len() <= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };
    if longer.windows(shorter.len()).any(|w| w == shorter.as_slice()) {
        return 100.0;
    }

    let pattern = LcsPattern::new(shorter);
    let mut best: f64 = 0.0;
    for (i, j, _) in BlockMatcher::new(shorter, longer).blocks() {
        let start = j.saturating_sub(i);
        let end = (start + shorter.len()).min(longer.len());
        let similarity = indel_similarity(&pattern, &longer[start..end]);
        if similarity > PERFECT_WINDOW {
            return 100.0;
        }
        best = best.max(similarity);
    }
    to_percent(best)
}

/// Company-name similarity (0 to 100) under the configured metric.
pub fn company_similarity(metric: CompanyMetric, a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    match metric {
        CompanyMetric::Indel => ratio(a, b),
        CompanyMetric::Levenshtein => to_percent(strsim::normalized_levenshtein(a, b)),
        CompanyMetric::JaroWinkler => to_percent(strsim::jaro_winkler(a, b)),
    }
}

/// Uncapped keyword overlap score: `points` per shared keyword.
pub fn keyword_score(query: &KeywordSet, candidate: &KeywordSet, points: f64) -> f64 {
    let (small, large) = if query.len() <= candidate.len() {
        (query, candidate)
    } else {
        (candidate, query)
    };
    let shared = small.iter().filter(|k| large.contains(*k)).count();
    shared as f64 * points
}

// ============================================================================
// Combined Scoring
// ============================================================================

/// Weighted multi-field scorer. Deterministic: the score depends only on
/// the query, the candidate and the configuration it was built from.
#[derive(Clone, Debug)]
pub struct Scorer {
    weights: ScoreWeights,
    keyword_points: f64,
    company_metric: CompanyMetric,
}

impl Scorer {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            weights: config.weights,
            keyword_points: config.keyword_points,
            company_metric: config.company_metric,
        }
    }

    pub fn breakdown(&self, query: &NormalizedQuery, candidate: &MatchCandidate) -> ScoreBreakdown {
        let company = company_similarity(self.company_metric, &query.company, candidate.company());
        let product = partial_ratio(&query.product, candidate.product());
        let keywords = keyword_score(&query.keywords, &candidate.keywords, self.keyword_points);

        let total = self.weights.company * company
            + self.weights.product * product
            + self.weights.keywords * keywords;

        ScoreBreakdown {
            company,
            product,
            keywords,
            total,
        }
    }

    pub fn score(&self, query: &NormalizedQuery, candidate: &MatchCandidate) -> f64 {
        self.breakdown(query, candidate).total
    }
}
