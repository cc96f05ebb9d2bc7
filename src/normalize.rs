//! Title normalization shared by the award and metadata sides of a run.
//!
//! Both datasets MUST be normalized with the same `NormalizationRules`,
//! otherwise index keys and lookup keys drift apart and nothing matches.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// RULE TABLES
// ============================================================================

/// Substrings removed by the standard rule set.
/// Multi-character sequences come first so " - " is consumed before "-" variants.
pub const STANDARD_STRIP: &[&str] = &[
    " - ", " – ", " — ", "...", "…", ":", "!", "?", "–", "—", "/", "'", "\u{2019}",
    "\u{2018}", ".", ",", "\"", "\u{201C}", "\u{201D}", "·",
];

/// Substrings removed by the first-generation rules (parentheses included).
pub const LEGACY_STRIP: &[&str] = &[":", "!", "?", " - ", "...", "/", ")", "(", "'", "."];

/// Accented/foreign characters with a fixed ASCII replacement.
pub const STANDARD_TRANSLITERATIONS: &[(char, &str)] = &[
    ('ž', "z"),
    ('ń', "n"),
    ('ñ', "n"),
    ('é', "e"),
    ('è', "e"),
    ('á', "a"),
    ('à', "a"),
    ('í', "i"),
    ('ó', "o"),
    ('ö', "o"),
    ('ú', "u"),
    ('ü', "u"),
    ('ç', "c"),
    ('ł', "l"),
    ('ø', "o"),
    ('æ', "ae"),
];

/// Splits "title (alternate title)" into its segments.
static PARENTHESIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[()]").unwrap());

// ============================================================================
// RULES
// ============================================================================

/// Named rule presets selectable from config and CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RulePreset {
    #[default]
    Standard,
    Legacy,
}

/// Parameterized cleaning rules applied by [`normalize`].
#[derive(Debug, Clone)]
pub struct NormalizationRules {
    /// Substrings deleted from the title, applied in order.
    pub strip: Vec<String>,
    /// Single characters replaced by an ASCII string.
    pub transliterations: FxHashMap<char, String>,
    /// Fold whatever non-ASCII text remains via NFKD + any_ascii.
    pub fold_diacritics: bool,
}

impl NormalizationRules {
    pub fn standard() -> Self {
        Self {
            strip: STANDARD_STRIP.iter().map(|s| s.to_string()).collect(),
            transliterations: STANDARD_TRANSLITERATIONS
                .iter()
                .map(|&(c, r)| (c, r.to_string()))
                .collect(),
            fold_diacritics: false,
        }
    }

    pub fn legacy() -> Self {
        Self {
            strip: LEGACY_STRIP.iter().map(|s| s.to_string()).collect(),
            transliterations: FxHashMap::default(),
            fold_diacritics: false,
        }
    }

    pub fn from_preset(preset: RulePreset) -> Self {
        match preset {
            RulePreset::Standard => Self::standard(),
            RulePreset::Legacy => Self::legacy(),
        }
    }

    /// True if `s` contains any substring this rule set strips.
    pub fn has_strippable(&self, s: &str) -> bool {
        self.strip.iter().any(|p| s.contains(p.as_str()))
    }
}

impl Default for NormalizationRules {
    fn default() -> Self {
        Self::standard()
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to ASCII by applying NFKD decomposition and removing combining marks.
/// e.g., "Amélie" → "amelie", "Ladri di biciclette" is unchanged apart from case.
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

fn apply_pass(s: &str, rules: &NormalizationRules) -> String {
    let mut result = s.to_string();
    for pattern in &rules.strip {
        if result.contains(pattern.as_str()) {
            result = result.replace(pattern.as_str(), "");
        }
    }

    let mut transliterated = String::with_capacity(result.len());
    for c in result.chars() {
        match rules.transliterations.get(&c) {
            Some(replacement) => transliterated.push_str(replacement),
            None => transliterated.push(c),
        }
    }

    if rules.fold_diacritics {
        transliterated = fold_to_ascii(&transliterated);
    }

    transliterated.to_lowercase()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize a title for matching: strip punctuation, transliterate, lowercase.
///
/// The pass is repeated until the result stops changing. Removing one
/// substring can expose another (" -. " becomes " - "), and uppercase
/// characters only hit the transliteration table after lowercasing.
/// Real titles settle in two passes; nested separators take one pass per
/// layer.
pub fn normalize(raw: &str, rules: &NormalizationRules) -> String {
    let mut current = apply_pass(raw, rules);
    loop {
        let next = apply_pass(&current, rules);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Normalize a possibly-missing title. `None` passes through untouched.
pub fn normalize_field(raw: Option<&str>, rules: &NormalizationRules) -> Option<String> {
    raw.map(|title| normalize(title, rules))
}

/// Split a normalized title on parenthesis boundaries.
/// e.g., "evil dead ii (evil dead 2)" → ["evil dead ii", "evil dead 2"]
///
/// Returns an empty list if the title carries no parentheses.
pub fn split_parenthetical(normalized: &str) -> Vec<String> {
    if !PARENTHESIS.is_match(normalized) {
        return Vec::new();
    }
    PARENTHESIS
        .split(normalized)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
