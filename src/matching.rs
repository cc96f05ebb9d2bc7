//! Exact title lookup against the English and original-title indexes.
//!
//! Year equality is a hard filter everywhere.

use crate::models::{CandidateIndex, ExactHit, MatchRoute, TitleRecord};
use crate::normalize::split_parenthetical;

/// Look up one key in both indexes, English first.
fn lookup(
    key: &str,
    year: i32,
    english: &CandidateIndex,
    original: &CandidateIndex,
    via_parenthetical: bool,
) -> Option<ExactHit> {
    if let Some(entry) = english.get(key).filter(|e| e.year == year) {
        return Some(ExactHit {
            canonical_title: entry.canonical_title.clone(),
            year,
            route: MatchRoute::English,
            matched_key: key.to_string(),
            via_parenthetical,
        });
    }

    original.get(key).filter(|e| e.year == year).map(|entry| ExactHit {
        // Resolve to the common title; fall back to the original if the row had none
        canonical_title: entry
            .cross_ref
            .clone()
            .unwrap_or_else(|| entry.canonical_title.clone()),
        year,
        route: MatchRoute::Original,
        matched_key: key.to_string(),
        via_parenthetical,
    })
}

/// Exact-match a record. `None` means not found: move on to similarity ranking.
///
/// Order:
/// 1. full normalized title in the English index
/// 2. full normalized title in the original-title index
/// 3. each parenthesis-delimited sub-title, retrying 1-2, first hit wins
pub fn match_exact(
    record: &TitleRecord,
    english: &CandidateIndex,
    original: &CandidateIndex,
) -> Option<ExactHit> {
    let title = record.normalized_title.as_deref()?;

    lookup(title, record.year, english, original, false).or_else(|| {
        split_parenthetical(title)
            .iter()
            .find_map(|sub| lookup(sub, record.year, english, original, true))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetadataTitle;
    use crate::normalize::NormalizationRules;

    fn movie(title: &str, original: &str, year: i32) -> MetadataTitle {
        MetadataTitle {
            title: Some(title.to_string()),
            original_title: Some(original.to_string()),
            year,
        }
    }

    fn indexes(movies: &[MetadataTitle]) -> (CandidateIndex, CandidateIndex) {
        let rules = NormalizationRules::standard();
        (
            CandidateIndex::english(movies, &rules),
            CandidateIndex::original(movies, &rules),
        )
    }

    fn record(title: &str, year: i32) -> TitleRecord {
        TitleRecord::new(0, Some(title.to_string()), year, &NormalizationRules::standard())
    }

    #[test]
    fn test_english_hit() {
        let (english, original) = indexes(&[movie("No Country for Old Men", "No Country for Old Men", 2007)]);
        let hit = match_exact(&record("No Country for Old Men", 2007), &english, &original).unwrap();
        assert_eq!(hit.canonical_title, "No Country for Old Men");
        assert_eq!(hit.route, MatchRoute::English);
        assert!(!hit.via_parenthetical);
    }

    #[test]
    fn test_year_mismatch_is_not_found() {
        let (english, original) = indexes(&[movie("Crash", "Crash", 2004)]);
        assert!(match_exact(&record("Crash", 2005), &english, &original).is_none());
    }

    #[test]
    fn test_original_title_resolves_to_english() {
        let (english, original) = indexes(&[movie("The Lives of Others", "Das Leben der Anderen", 2006)]);
        let hit = match_exact(&record("Das Leben der Anderen", 2006), &english, &original).unwrap();
        assert_eq!(hit.canonical_title, "The Lives of Others");
        assert_eq!(hit.route, MatchRoute::Original);
        assert_eq!(hit.matched_key, "das leben der anderen");
    }

    #[test]
    fn test_english_wins_over_original() {
        let (english, original) = indexes(&[
            movie("Departures", "Okuribito", 2008),
            movie("Okuribito", "Something Else", 2008),
        ]);
        let hit = match_exact(&record("Okuribito", 2008), &english, &original).unwrap();
        assert_eq!(hit.route, MatchRoute::English);
        assert_eq!(hit.canonical_title, "Okuribito");
    }

    #[test]
    fn test_parenthetical_fallback() {
        let (english, original) = indexes(&[movie("Evil Dead 2", "Evil Dead 2", 1987)]);
        let hit = match_exact(&record("Evil Dead II (Evil Dead 2)", 1987), &english, &original).unwrap();
        assert_eq!(hit.canonical_title, "Evil Dead 2");
        assert_eq!(hit.matched_key, "evil dead 2");
        assert!(hit.via_parenthetical);
    }

    #[test]
    fn test_parenthetical_takes_first_segment_hit() {
        let (english, original) = indexes(&[
            movie("Volver", "Volver", 2006),
            movie("To Return", "To Return", 2006),
        ]);
        let hit = match_exact(&record("Volver (To Return)", 2006), &english, &original).unwrap();
        assert_eq!(hit.canonical_title, "Volver");
    }

    #[test]
    fn test_parenthetical_sub_title_through_original_index() {
        let (english, original) = indexes(&[movie("The Sea Inside", "Mar adentro", 2004)]);
        let hit = match_exact(&record("The Sea Inside Out (Mar Adentro)", 2004), &english, &original).unwrap();
        assert_eq!(hit.canonical_title, "The Sea Inside");
        assert_eq!(hit.route, MatchRoute::Original);
        assert!(hit.via_parenthetical);
    }

    #[test]
    fn test_skipped_record_is_not_found() {
        let (english, original) = indexes(&[movie("Up", "Up", 2009)]);
        let skipped = TitleRecord::new(3, None, 2009, &NormalizationRules::standard());
        assert!(match_exact(&skipped, &english, &original).is_none());
    }

    #[test]
    fn test_identical_records_resolve_identically() {
        let (english, original) = indexes(&[movie("Magnolia", "Magnolia", 1999)]);
        let a = TitleRecord::new(1, Some("Magnolia".to_string()), 1999, &NormalizationRules::standard());
        let b = TitleRecord::new(7, Some("MAGNOLIA".to_string()), 1999, &NormalizationRules::standard());
        let hit_a = match_exact(&a, &english, &original).unwrap();
        let hit_b = match_exact(&b, &english, &original).unwrap();
        assert_eq!(hit_a, hit_b);
    }
}
