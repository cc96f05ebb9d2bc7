//! Optional TOML run configuration. Every key has a default, so an empty
//! file (or no file) is a valid config.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::curation::CurationConfig;
use crate::normalize::{NormalizationRules, RulePreset};
use crate::scoring::{SimilarityMetric, DEFAULT_THRESHOLD};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config validation error: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Provisional matches at or above this score are flagged for review first.
    pub threshold: f64,
    pub metric: SimilarityMetric,
    pub normalization: NormalizationConfig,
    pub curation: CurationConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            metric: SimilarityMetric::default(),
            normalization: NormalizationConfig::default(),
            curation: CurationConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// A preset plus optional overrides of its tables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub preset: RulePreset,
    /// Replaces the preset's strip list when set.
    pub strip: Option<Vec<String>>,
    /// Replaces the preset's transliteration table when set. Keys are single characters.
    pub transliterate: Option<BTreeMap<String, String>>,
    pub fold_diacritics: bool,
}

impl NormalizationConfig {
    pub fn to_rules(&self) -> Result<NormalizationRules, ConfigError> {
        let mut rules = NormalizationRules::from_preset(self.preset);

        if let Some(strip) = &self.strip {
            if let Some(pos) = strip.iter().position(|s| s.is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "normalization.strip[{}] is empty",
                    pos
                )));
            }
            rules.strip = strip.clone();
        }

        if let Some(table) = &self.transliterate {
            let mut transliterations = rustc_hash::FxHashMap::default();
            for (key, value) in table {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => {
                        transliterations.insert(c, value.clone());
                    }
                    _ => {
                        return Err(ConfigError::Validation(format!(
                            "normalization.transliterate key '{}' must be a single character",
                            key
                        )))
                    }
                }
            }
            // A replacement that reintroduces a key would never settle under normalize()
            for (key, value) in &transliterations {
                if value.to_lowercase().chars().any(|c| transliterations.contains_key(&c)) {
                    return Err(ConfigError::Validation(format!(
                        "normalization.transliterate value '{}' for '{}' contains a transliterated character",
                        value, key
                    )));
                }
            }
            rules.transliterations = transliterations;
        }

        rules.fold_diacritics = self.fold_diacritics;
        Ok(rules)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ReconcileConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: ReconcileConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::Validation(format!(
                "threshold must be within 0.0..=1.0, got {}",
                self.threshold
            )));
        }
        if self.curation.min_ceremony_year > self.curation.max_film_year + 1 {
            return Err(ConfigError::Validation(format!(
                "curation window is empty: min_ceremony_year {} > max_film_year {} + 1",
                self.curation.min_ceremony_year, self.curation.max_film_year
            )));
        }
        self.normalization.to_rules().map(|_| ())
    }

    pub fn rules(&self) -> Result<NormalizationRules, ConfigError> {
        self.normalization.to_rules()
    }
}
