//! Reconciliation driver: exact pass, then similarity pass over what's left.
//!
//! A run produces one immutable `ReconciliationReport`; nothing is shared or
//! accumulated between runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::dataset::AwardRow;
use crate::matching::match_exact;
use crate::models::{
    AwardTitle, CandidateIndex, MatchResult, MetadataTitle, ReconcileStats, ReconciliationReport,
    TitleRecord,
};
use crate::normalize::NormalizationRules;
use crate::scoring::{rank_candidates, SimilarityMetric, DEFAULT_THRESHOLD};

// ============================================================================
// Progress
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Exact,
    Similarity,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Exact => "Exact matching",
            Phase::Similarity => "Similarity ranking",
        }
    }
}

/// Progress event passed to the caller's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase: Phase,
    pub done: usize,
    pub total: usize,
}

// ============================================================================
// Reconciler
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub threshold: f64,
    pub metric: SimilarityMetric,
    /// Rank not-found records across the rayon pool.
    pub parallel: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            metric: SimilarityMetric::default(),
            parallel: true,
        }
    }
}

/// Holds the two read-only candidate indexes for a run.
pub struct Reconciler {
    rules: NormalizationRules,
    english: CandidateIndex,
    original: CandidateIndex,
    options: ReconcileOptions,
}

impl Reconciler {
    /// Build both indexes from the metadata catalog.
    pub fn new(movies: &[MetadataTitle], rules: NormalizationRules, options: ReconcileOptions) -> Self {
        let english = CandidateIndex::english(movies, &rules);
        let original = CandidateIndex::original(movies, &rules);
        info!(
            movies = movies.len(),
            english_keys = english.len(),
            original_keys = original.len(),
            "built candidate indexes"
        );
        Self {
            rules,
            english,
            original,
            options,
        }
    }

    /// Normalize award titles into records with this run's rules.
    pub fn records(&self, awards: &[AwardTitle]) -> Vec<TitleRecord> {
        awards
            .iter()
            .map(|award| TitleRecord::from_award(award, &self.rules))
            .collect()
    }

    pub fn reconcile(&self, awards: &[AwardTitle]) -> ReconciliationReport {
        self.reconcile_with_progress(awards, &|_| {})
    }

    /// Run both passes, reporting progress through `on_progress`.
    pub fn reconcile_with_progress(
        &self,
        awards: &[AwardTitle],
        on_progress: &(dyn Fn(Progress) + Sync),
    ) -> ReconciliationReport {
        let start = Instant::now();
        let records = self.records(awards);
        let mut stats = ReconcileStats {
            english_index_size: self.english.len(),
            original_index_size: self.original.len(),
            total_records: records.len(),
            ..Default::default()
        };
        let mut report = ReconciliationReport::default();

        // Phase 1: exact lookup
        let total = records.len();
        let mut not_found = Vec::new();
        for (i, record) in records.into_iter().enumerate() {
            if record.is_skipped() {
                stats.normalization_skipped += 1;
            }
            match match_exact(&record, &self.english, &self.original) {
                Some(hit) => {
                    stats.record_exact(&hit);
                    report.matched.push((record, hit));
                }
                None => not_found.push(record),
            }
            on_progress(Progress {
                phase: Phase::Exact,
                done: i + 1,
                total,
            });
        }
        info!(
            exact = report.matched.len(),
            not_found = not_found.len(),
            "exact matching done"
        );

        // Phase 2: similarity ranking for everything not found
        let total = not_found.len();
        let done = AtomicUsize::new(0);
        let rank = |record: &TitleRecord| {
            let result = rank_candidates(record, &self.english, self.options.threshold, self.options.metric);
            on_progress(Progress {
                phase: Phase::Similarity,
                done: done.fetch_add(1, Ordering::Relaxed) + 1,
                total,
            });
            result
        };
        let ranked: Vec<MatchResult> = if self.options.parallel {
            not_found.par_iter().map(rank).collect()
        } else {
            not_found.iter().map(rank).collect()
        };

        for (record, result) in not_found.into_iter().zip(ranked) {
            match result {
                MatchResult::Similarity(hit) if hit.above_threshold => {
                    stats.similarity_above_threshold += 1;
                    report.provisional.push((record, hit));
                }
                MatchResult::Similarity(hit) => {
                    stats.unmatched_below_threshold += 1;
                    report.unmatched.push((record, MatchResult::Similarity(hit)));
                }
                MatchResult::Unmatched => {
                    if record.is_skipped() {
                        stats.unmatched_skipped += 1;
                    } else {
                        stats.unmatched_no_same_year += 1;
                        debug!(row = record.row, year = record.year, "no same-year candidate");
                    }
                    report.unmatched.push((record, MatchResult::Unmatched));
                }
                // match_exact already took every exact hit
                MatchResult::Exact(hit) => report.matched.push((record, hit)),
            }
        }

        // Least confident first; stable so equal scores keep input order
        report
            .provisional
            .sort_by(|(_, a), (_, b)| a.score.total_cmp(&b.score));

        stats.elapsed_seconds = start.elapsed().as_secs_f64();
        report.stats = stats;
        report
    }
}

// ============================================================================
// Write-back
// ============================================================================

/// Replace `film` on award rows with the canonical title of each exact match.
///
/// Rows are addressed by `TitleRecord::row`, the position in `awards` the
/// records were built from. Similarity matches are left for review and never
/// written. Returns the number of rows whose title changed.
pub fn apply_exact_titles(awards: &mut [AwardRow], report: &ReconciliationReport) -> usize {
    let mut changed = 0;
    for (record, hit) in &report.matched {
        if let Some(row) = awards.get_mut(record.row) {
            if row.film.as_deref() != Some(hit.canonical_title.as_str()) {
                row.film = Some(hit.canonical_title.clone());
                changed += 1;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchRoute;
    use std::sync::Mutex;

    fn movie(title: &str, original: &str, year: i32) -> MetadataTitle {
        MetadataTitle {
            title: Some(title.to_string()),
            original_title: Some(original.to_string()),
            year,
        }
    }

    fn award(row: usize, film: Option<&str>, year: i32) -> AwardTitle {
        AwardTitle {
            row,
            film: film.map(str::to_string),
            year,
        }
    }

    fn catalog() -> Vec<MetadataTitle> {
        vec![
            movie("Harry Potter and the Philosopher's Stone", "Harry Potter and the Philosopher's Stone", 2002),
            movie("Mount Head", "Atama-yama", 2002),
            movie("Spirited Away", "千と千尋の神隠し", 2002),
            movie("Evil Dead 2", "Evil Dead 2", 2002),
            movie("The Lives of Others", "Das Leben der Anderen", 2006),
            movie("Magnolia", "Magnolia", 1999),
        ]
    }

    fn reconciler(parallel: bool) -> Reconciler {
        Reconciler::new(
            &catalog(),
            NormalizationRules::standard(),
            ReconcileOptions {
                parallel,
                ..Default::default()
            },
        )
    }

    fn awards() -> Vec<AwardTitle> {
        vec![
            award(0, Some("Spirited Away"), 2002),
            award(1, Some("Harry Potter and the Sorcerer's Stone"), 2002),
            award(2, Some("Mt. Head"), 2002),
            award(3, Some("Evil Dead II (Evil Dead 2)"), 2002),
            award(4, Some("Das Leben der Anderen"), 2006),
            award(5, Some("Magnolia"), 1999),
            award(6, Some("Magnolia"), 1999),
            award(7, Some("Nowhere Film"), 1980),
            award(8, None, 2002),
        ]
    }

    #[test]
    fn test_reconcile_partitions() {
        let report = reconciler(false).reconcile(&awards());

        let matched_rows: Vec<usize> = report.matched.iter().map(|(r, _)| r.row).collect();
        assert_eq!(matched_rows, vec![0, 3, 4, 5, 6]);

        let provisional_rows: Vec<usize> = report.provisional.iter().map(|(r, _)| r.row).collect();
        assert_eq!(provisional_rows.len(), 2);
        assert!(provisional_rows.contains(&1));
        assert!(provisional_rows.contains(&2));

        let unmatched_rows: Vec<usize> = report.unmatched.iter().map(|(r, _)| r.row).collect();
        assert_eq!(unmatched_rows, vec![7, 8]);
        assert!(report.unmatched.iter().all(|(_, result)| *result == MatchResult::Unmatched));
        assert_eq!(report.total(), 9);
    }

    #[test]
    fn test_reconcile_routes_and_stats() {
        let report = reconciler(false).reconcile(&awards());
        let stats = &report.stats;
        assert_eq!(stats.total_records, 9);
        assert_eq!(stats.exact_english, 4);
        assert_eq!(stats.exact_original, 1);
        assert_eq!(stats.exact_parenthetical, 1);
        assert_eq!(stats.similarity_above_threshold, 2);
        assert_eq!(stats.unmatched_below_threshold, 0);
        assert_eq!(stats.unmatched_total(), 2);
        assert_eq!(stats.unmatched_no_same_year, 1);
        assert_eq!(stats.unmatched_skipped, 1);
        assert_eq!(stats.normalization_skipped, 1);
        assert_eq!(stats.english_index_size, 6);

        let (_, lives) = report.matched.iter().find(|(r, _)| r.row == 4).unwrap();
        assert_eq!(lives.route, MatchRoute::Original);
        assert_eq!(lives.canonical_title, "The Lives of Others");
    }

    #[test]
    fn test_below_threshold_is_unmatched_with_candidate() {
        let reconciler = Reconciler::new(
            &[movie("Zzzz", "Zzzz", 2005)],
            NormalizationRules::standard(),
            ReconcileOptions::default(),
        );
        let report = reconciler.reconcile(&[award(0, Some("Abc"), 2005)]);

        assert!(report.provisional.is_empty());
        assert_eq!(report.unmatched.len(), 1);
        match &report.unmatched[0].1 {
            MatchResult::Similarity(hit) => {
                assert_eq!(hit.candidate_title, "Zzzz");
                assert_eq!(hit.score, 0.0);
                assert!(!hit.above_threshold);
            }
            other => panic!("expected weak candidate, got {:?}", other),
        }
        assert_eq!(report.stats.unmatched_below_threshold, 1);
        assert_eq!(report.stats.similarity_above_threshold, 0);
    }

    #[test]
    fn test_threshold_splits_provisional_and_unmatched() {
        // Mt. Head scores 14/17 against Mount Head
        let strict = Reconciler::new(
            &catalog(),
            NormalizationRules::standard(),
            ReconcileOptions {
                threshold: 0.95,
                parallel: false,
                ..Default::default()
            },
        )
        .reconcile(&awards());
        assert!(strict.provisional.is_empty());
        assert_eq!(strict.stats.unmatched_below_threshold, 2);
        let (_, head) = strict.unmatched.iter().find(|(r, _)| r.row == 2).unwrap();
        assert!((head.score() - 14.0 / 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_provisional_sorted_ascending() {
        let report = reconciler(false).reconcile(&awards());
        let scores: Vec<f64> = report.provisional.iter().map(|(_, h)| h.score).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
        let (_, potter) = report.provisional.iter().find(|(r, _)| r.row == 1).unwrap();
        assert_eq!(potter.candidate_title, "Harry Potter and the Philosopher's Stone");
        let (_, head) = report.provisional.iter().find(|(r, _)| r.row == 2).unwrap();
        assert_eq!(head.candidate_title, "Mount Head");
    }

    #[test]
    fn test_identical_records_share_exact_match() {
        let report = reconciler(false).reconcile(&awards());
        let magnolia: Vec<_> = report
            .matched
            .iter()
            .filter(|(r, _)| r.row == 5 || r.row == 6)
            .map(|(_, hit)| hit.clone())
            .collect();
        assert_eq!(magnolia.len(), 2);
        assert_eq!(magnolia[0], magnolia[1]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = reconciler(false).reconcile(&awards());
        let parallel = reconciler(true).reconcile(&awards());
        assert_eq!(sequential.matched, parallel.matched);
        assert_eq!(sequential.provisional, parallel.provisional);
        assert_eq!(sequential.unmatched, parallel.unmatched);
    }

    #[test]
    fn test_progress_callback_counts() {
        let events = Mutex::new(Vec::new());
        reconciler(false).reconcile_with_progress(&awards(), &|p| events.lock().unwrap().push(p));
        let events = events.into_inner().unwrap();

        let exact: Vec<_> = events.iter().filter(|p| p.phase == Phase::Exact).collect();
        assert_eq!(exact.len(), 9);
        assert_eq!(exact.last().unwrap().done, 9);

        let similarity: Vec<_> = events.iter().filter(|p| p.phase == Phase::Similarity).collect();
        assert_eq!(similarity.len(), 4);
        assert!(similarity.iter().all(|p| p.total == 4));
    }

    #[test]
    fn test_apply_exact_titles() {
        let mut rows: Vec<AwardRow> = awards()
            .iter()
            .map(|a| AwardRow {
                year_film: a.year,
                year_ceremony: a.year + 1,
                ceremony: None,
                category: "DIRECTING".to_string(),
                name: None,
                film: a.film.clone(),
                winner: None,
            })
            .collect();
        let report = reconciler(false).reconcile(&awards());

        let changed = apply_exact_titles(&mut rows, &report);
        // Spirited Away and both Magnolias already carry the canonical title
        assert_eq!(changed, 2);
        assert_eq!(rows[3].film.as_deref(), Some("Evil Dead 2"));
        assert_eq!(rows[4].film.as_deref(), Some("The Lives of Others"));
        // Similarity matches are not written back
        assert_eq!(rows[1].film.as_deref(), Some("Harry Potter and the Sorcerer's Stone"));
        assert_eq!(rows[8].film, None);
    }
}
