//! Similarity scoring for titles that fail exact lookup.
//!
//! This module contains:
//! - The gestalt (Ratcliff/Obershelp) ratio over matching contiguous blocks
//! - Alternative metrics from strsim, selectable by config
//! - Same-year best-candidate ranking

use serde::Deserialize;

use crate::models::{CandidateIndex, IndexEntry, MatchResult, SimilarityHit, TitleRecord};

// ============================================================================
// Score Thresholds
// ============================================================================

/// Default review threshold for provisional matches.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

// ============================================================================
// Metrics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// 2·M / (|a| + |b|), M = total length of matching contiguous blocks
    #[default]
    Gestalt,
    NormalizedLevenshtein,
    JaroWinkler,
}

impl SimilarityMetric {
    /// Score two normalized titles in [0.0, 1.0]. Symmetric for every metric.
    pub fn score(self, a: &str, b: &str) -> f64 {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        match self {
            SimilarityMetric::Gestalt => gestalt_ratio(a, b),
            SimilarityMetric::NormalizedLevenshtein => strsim::normalized_levenshtein(a, b),
            SimilarityMetric::JaroWinkler => strsim::jaro_winkler(a, b),
        }
    }
}

// ============================================================================
// Gestalt Ratio
// ============================================================================

/// Longest common contiguous block in a[alo..ahi] × b[blo..bhi].
/// Returns (i, j, size); ties go to the earliest block in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    // prev[j + 1] = length of the common run ending at (i - 1, blo + j)
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in 0..width {
            cur[j + 1] = if a[i] == b[blo + j] { prev[j] + 1 } else { 0 };
            let k = cur[j + 1];
            if k > best.2 {
                best = (i + 1 - k, blo + j + 1 - k, k);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

/// Total size of all matching blocks, found by recursing left and right of
/// each longest match.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        if alo >= ahi || blo >= bhi {
            continue;
        }
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        queue.push((alo, i, blo, j));
        queue.push((i + k, ahi, j + k, bhi));
    }
    total
}

/// Ratcliff/Obershelp similarity of two strings.
///
/// Block selection depends on argument order, so the pair is put in a fixed
/// order first; this keeps `gestalt_ratio(a, b) == gestalt_ratio(b, a)`.
pub fn gestalt_ratio(a: &str, b: &str) -> f64 {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let a_chars: Vec<char> = first.chars().collect();
    let b_chars: Vec<char> = second.chars().collect();

    let len = a_chars.len() + b_chars.len();
    if len == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a_chars, &b_chars) as f64 / len as f64
}

// ============================================================================
// Ranking
// ============================================================================

/// Best same-year candidate for a record that failed exact matching.
///
/// Every same-year entry of `english` is scored; the highest score wins and
/// ties keep the first-seen candidate. The result is a similarity match even
/// when it scores below `threshold`: the threshold only marks what a reviewer
/// should look at first. No same-year entry, or no title to score, is
/// `Unmatched`.
pub fn rank_candidates(
    record: &TitleRecord,
    english: &CandidateIndex,
    threshold: f64,
    metric: SimilarityMetric,
) -> MatchResult {
    let Some(title) = record.normalized_title.as_deref() else {
        return MatchResult::Unmatched;
    };

    let mut best: Option<(&IndexEntry, f64)> = None;
    for entry in english.entries_for_year(record.year) {
        let score = metric.score(title, &entry.key);
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((entry, score));
        }
    }

    match best {
        Some((entry, score)) => MatchResult::Similarity(SimilarityHit {
            candidate_key: entry.key.clone(),
            candidate_title: entry.canonical_title.clone(),
            year: record.year,
            score,
            above_threshold: score >= threshold,
        }),
        None => MatchResult::Unmatched,
    }
}

// ============================================================================
// TESTS
// ============================================================================
