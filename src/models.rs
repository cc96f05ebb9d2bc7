//! Core data models for title reconciliation.
//!
//! This module contains the record, index, result and report types that flow
//! through the matching pipeline.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::normalize::{normalize, normalize_field, NormalizationRules};

// ============================================================================
// Inputs
// ============================================================================

/// Award-side input: one film title per curated award row.
#[derive(Clone, Debug)]
pub struct AwardTitle {
    /// Position of the source row in the curated award table.
    pub row: usize,
    pub film: Option<String>,
    pub year: i32,
}

/// Metadata-side input: a catalog entry with both title forms.
#[derive(Clone, Debug)]
pub struct MetadataTitle {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub year: i32,
}

// ============================================================================
// Title Records
// ============================================================================

/// Normalized award title. Immutable once built.
///
/// `normalized_title` is `None` when the source row had no film title; such
/// records flow through the pipeline and end up unmatched.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TitleRecord {
    pub row: usize,
    pub raw_title: Option<String>,
    pub normalized_title: Option<String>,
    pub year: i32,
}

impl TitleRecord {
    pub fn new(row: usize, raw_title: Option<String>, year: i32, rules: &NormalizationRules) -> Self {
        let normalized_title = normalize_field(raw_title.as_deref(), rules);
        Self {
            row,
            raw_title,
            normalized_title,
            year,
        }
    }

    pub fn from_award(award: &AwardTitle, rules: &NormalizationRules) -> Self {
        Self::new(award.row, award.film.clone(), award.year, rules)
    }

    /// True if normalization was skipped because there was no title.
    pub fn is_skipped(&self) -> bool {
        self.normalized_title.is_none()
    }
}

// ============================================================================
// Candidate Index
// ============================================================================

/// Value stored under a normalized key.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    pub key: String,
    pub year: i32,
    pub canonical_title: String,
    /// English/common title this entry resolves to (original-title index only).
    pub cross_ref: Option<String>,
}

/// Normalized title → (year, canonical title) lookup.
///
/// Entries live in a Vec in first-insertion order; the map points into it.
/// A later insert with the same key overwrites the value but keeps the slot,
/// so iteration order (and similarity tie-breaking) stays deterministic.
#[derive(Clone, Debug, Default)]
pub struct CandidateIndex {
    entries: Vec<IndexEntry>,
    positions: FxHashMap<String, usize>,
}

impl CandidateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Last write wins for duplicate keys.
    /// Returns true if an existing key was overwritten.
    pub fn insert(&mut self, entry: IndexEntry) -> bool {
        match self.positions.get(&entry.key) {
            Some(&pos) => {
                self.entries[pos] = entry;
                true
            }
            None => {
                self.positions.insert(entry.key.clone(), self.entries.len());
                self.entries.push(entry);
                false
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.positions.get(key).map(|&pos| &self.entries[pos])
    }

    /// All entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Entries released in `year`, in first-insertion order.
    pub fn entries_for_year(&self, year: i32) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter().filter(move |e| e.year == year)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index keyed by the common (English) title.
    pub fn english(movies: &[MetadataTitle], rules: &NormalizationRules) -> Self {
        let mut index = Self::new();
        for movie in movies {
            if let Some(title) = movie.title.as_deref() {
                index.insert(IndexEntry {
                    key: normalize(title, rules),
                    year: movie.year,
                    canonical_title: title.to_string(),
                    cross_ref: None,
                });
            }
        }
        index
    }

    /// Index keyed by the original-language title, cross-referencing the common title.
    pub fn original(movies: &[MetadataTitle], rules: &NormalizationRules) -> Self {
        let mut index = Self::new();
        for movie in movies {
            if let Some(original) = movie.original_title.as_deref() {
                index.insert(IndexEntry {
                    key: normalize(original, rules),
                    year: movie.year,
                    canonical_title: original.to_string(),
                    cross_ref: movie.title.clone(),
                });
            }
        }
        index
    }
}

// ============================================================================
// Match Results
// ============================================================================

/// Which index produced an exact hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRoute {
    English,
    Original,
}

impl MatchRoute {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchRoute::English => "english",
            MatchRoute::Original => "original",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExactHit {
    pub canonical_title: String,
    pub year: i32,
    pub route: MatchRoute,
    /// Normalized key that hit; a sub-title when found through parentheses.
    pub matched_key: String,
    pub via_parenthetical: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimilarityHit {
    pub candidate_key: String,
    pub candidate_title: String,
    pub year: i32,
    pub score: f64,
    /// Score cleared the configured review threshold.
    pub above_threshold: bool,
}

/// Per-record outcome. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchResult {
    Exact(ExactHit),
    Similarity(SimilarityHit),
    Unmatched,
}

impl MatchResult {
    /// Confidence score: 1.0 for exact, the similarity for fuzzy, 0.0 for unmatched.
    pub fn score(&self) -> f64 {
        match self {
            MatchResult::Exact(_) => 1.0,
            MatchResult::Similarity(hit) => hit.score,
            MatchResult::Unmatched => 0.0,
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Outcome of one reconciliation run, partitioned three ways.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    pub matched: Vec<(TitleRecord, ExactHit)>,
    /// Similarity matches at or above the threshold, ascending score (least confident first).
    pub provisional: Vec<(TitleRecord, SimilarityHit)>,
    /// `MatchResult::Similarity` here is the best candidate that fell below the threshold.
    pub unmatched: Vec<(TitleRecord, MatchResult)>,
    pub stats: ReconcileStats,
}

impl ReconciliationReport {
    pub fn total(&self) -> usize {
        self.matched.len() + self.provisional.len() + self.unmatched.len()
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-route counts for one run.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileStats {
    pub english_index_size: usize,
    pub original_index_size: usize,

    pub total_records: usize,
    pub normalization_skipped: usize,

    pub exact_english: usize,
    pub exact_original: usize,
    pub exact_parenthetical: usize,

    pub similarity_above_threshold: usize,

    pub unmatched_below_threshold: usize,
    pub unmatched_no_same_year: usize,
    pub unmatched_skipped: usize,

    pub elapsed_seconds: f64,
}

impl ReconcileStats {
    pub fn exact_total(&self) -> usize {
        self.exact_english + self.exact_original
    }

    pub fn unmatched_total(&self) -> usize {
        self.unmatched_below_threshold + self.unmatched_no_same_year + self.unmatched_skipped
    }

    /// Exact match rate as a percentage
    pub fn match_rate(&self) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            100.0 * self.exact_total() as f64 / self.total_records as f64
        }
    }

    /// Record one exact hit.
    pub fn record_exact(&mut self, hit: &ExactHit) {
        match hit.route {
            MatchRoute::English => self.exact_english += 1,
            MatchRoute::Original => self.exact_original += 1,
        }
        if hit.via_parenthetical {
            self.exact_parenthetical += 1;
        }
    }

    /// Log stats as pretty JSON at info level
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::info!(phase, "run statistics\n{}", json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, year: i32, title: &str) -> IndexEntry {
        IndexEntry {
            key: key.to_string(),
            year,
            canonical_title: title.to_string(),
            cross_ref: None,
        }
    }

    #[test]
    fn test_index_last_write_wins_keeps_slot() {
        let mut index = CandidateIndex::new();
        assert!(!index.insert(entry("crash", 2004, "Crash")));
        assert!(!index.insert(entry("juno", 2007, "Juno")));
        assert!(index.insert(entry("crash", 1996, "Crash (1996)")));

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("crash").unwrap().year, 1996);
        let keys: Vec<&str> = index.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["crash", "juno"]);
    }

    #[test]
    fn test_index_builders() {
        let rules = NormalizationRules::standard();
        let movies = vec![
            MetadataTitle {
                title: Some("The Lives of Others".to_string()),
                original_title: Some("Das Leben der Anderen".to_string()),
                year: 2006,
            },
            MetadataTitle {
                title: None,
                original_title: Some("Amélie".to_string()),
                year: 2001,
            },
        ];

        let english = CandidateIndex::english(&movies, &rules);
        assert_eq!(english.len(), 1);
        assert_eq!(english.get("the lives of others").unwrap().canonical_title, "The Lives of Others");

        let original = CandidateIndex::original(&movies, &rules);
        assert_eq!(original.len(), 2);
        let entry = original.get("das leben der anderen").unwrap();
        assert_eq!(entry.cross_ref.as_deref(), Some("The Lives of Others"));
        assert_eq!(original.get("amelie").unwrap().cross_ref, None);
    }

    #[test]
    fn test_entries_for_year_preserves_order() {
        let mut index = CandidateIndex::new();
        index.insert(entry("a", 2002, "A"));
        index.insert(entry("b", 2003, "B"));
        index.insert(entry("c", 2002, "C"));
        let keys: Vec<&str> = index.entries_for_year(2002).map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(index.entries_for_year(1999).count(), 0);
    }

    #[test]
    fn test_match_result_score() {
        assert_eq!(MatchResult::Unmatched.score(), 0.0);
        let hit = SimilarityHit {
            candidate_key: "x".to_string(),
            candidate_title: "X".to_string(),
            year: 2002,
            score: 0.42,
            above_threshold: false,
        };
        assert_eq!(MatchResult::Similarity(hit).score(), 0.42);
    }

    #[test]
    fn test_stats_match_rate() {
        let stats = ReconcileStats {
            total_records: 4,
            exact_english: 2,
            exact_original: 1,
            ..Default::default()
        };
        assert_eq!(stats.exact_total(), 3);
        assert!((stats.match_rate() - 75.0).abs() < 1e-9);
        assert_eq!(ReconcileStats::default().match_rate(), 0.0);
    }

    #[test]
    fn test_stats_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let stats = ReconcileStats {
            total_records: 2,
            exact_original: 1,
            ..Default::default()
        };
        stats.write_to_file(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["total_records"], 2);
        assert_eq!(json["exact_original"], 1);
    }
}
