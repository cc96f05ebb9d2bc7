//! Award-side curation applied before matching.
//!
//! Drops categories not tied to a specific film, fills foreign-language
//! special award titles from the name column, restricts the ceremony and
//! film year range, and folds renamed categories into their current labels.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::dataset::AwardRow;

// ============================================================================
// Category Tables
// ============================================================================

/// Honorary, humanitarian and memorial awards: not tied to a film.
pub const NON_FILM_CATEGORIES: &[&str] = &[
    "HONORARY AWARD",
    "SPECIAL AWARD",
    "IRVING G. THALBERG MEMORIAL AWARD",
    "JEAN HERSHOLT HUMANITARIAN AWARD",
    "SPECIAL ACHIEVEMENT AWARD",
];

/// Categories whose film title is stored in `name` as "Title - Country".
pub const FILM_IN_NAME_CATEGORIES: &[&str] = &[
    "SPECIAL FOREIGN LANGUAGE FILM AWARD",
    "HONORARY FOREIGN LANGUAGE FILM AWARD",
];

/// Categories where a missing film can't be recovered reliably.
pub const UNRECOVERABLE_FILM_CATEGORIES: &[&str] = &[
    "ENGINEERING EFFECTS",
    "WRITING (Title Writing)",
    "SOUND RECORDING",
    "ASSISTANT DIRECTOR",
];

/// Discontinued after 2019; the only category dropped inside the year range.
pub const DISCONTINUED_CATEGORY: &str = "SOUND EDITING";

/// Legacy category label → current label.
pub static CATEGORY_RENAMES: Lazy<FxHashMap<&str, &str>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert("FOREIGN LANGUAGE FILM", "INTERNATIONAL FEATURE FILM");
    m.insert("ART DIRECTION", "PRODUCTION DESIGN");
    m.insert(
        "WRITING (Screenplay Based on Material Previously Produced or Published)",
        "WRITING (Adapted Screenplay)",
    );
    m.insert(
        "WRITING (Screenplay Written Directly for the Screen)",
        "WRITING (Original Screenplay)",
    );
    m.insert("SOUND MIXING", "SOUND");
    m.insert("MAKEUP", "MAKEUP AND HAIRSTYLING");
    m
});

// ============================================================================
// Config & Stats
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    /// First ceremony kept (Animated Feature was introduced in 2002).
    pub min_ceremony_year: i32,
    /// Last film year kept (the metadata catalog ends in 2017).
    pub max_film_year: i32,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            min_ceremony_year: 2002,
            max_film_year: 2017,
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct CurationStats {
    pub input_rows: usize,
    pub dropped_non_film: usize,
    pub film_from_name: usize,
    pub dropped_unrecoverable_film: usize,
    pub dropped_before_min_ceremony: usize,
    pub dropped_discontinued: usize,
    pub renamed_categories: usize,
    pub dropped_after_max_film_year: usize,
    pub kept: usize,
}

// ============================================================================
// Curation
// ============================================================================

/// Film title from a "Title - Country" name field.
pub fn film_from_name(name: &str) -> String {
    name.split('-').next().unwrap_or("").trim().to_string()
}

pub fn is_non_film(category: &str) -> bool {
    NON_FILM_CATEGORIES.contains(&category)
}

/// Apply every curation step in order. Row order is preserved.
pub fn curate(rows: Vec<AwardRow>, config: &CurationConfig) -> (Vec<AwardRow>, CurationStats) {
    let mut stats = CurationStats {
        input_rows: rows.len(),
        ..Default::default()
    };
    let mut kept = Vec::with_capacity(rows.len());

    for mut row in rows {
        if is_non_film(&row.category) {
            stats.dropped_non_film += 1;
            continue;
        }

        if FILM_IN_NAME_CATEGORIES.contains(&row.category.as_str()) {
            if let Some(name) = row.name.as_deref() {
                row.film = Some(film_from_name(name));
                stats.film_from_name += 1;
            }
        }

        if row.film.is_none() && UNRECOVERABLE_FILM_CATEGORIES.contains(&row.category.as_str()) {
            stats.dropped_unrecoverable_film += 1;
            continue;
        }

        if row.year_ceremony < config.min_ceremony_year {
            stats.dropped_before_min_ceremony += 1;
            continue;
        }

        if row.category == DISCONTINUED_CATEGORY {
            stats.dropped_discontinued += 1;
            continue;
        }

        if let Some(&current) = CATEGORY_RENAMES.get(row.category.as_str()) {
            row.category = current.to_string();
            stats.renamed_categories += 1;
        }

        if row.year_film > config.max_film_year {
            stats.dropped_after_max_film_year += 1;
            continue;
        }

        kept.push(row);
    }

    stats.kept = kept.len();
    (kept, stats)
}
