//! CSV loading for the award and metadata datasets.
//!
//! Malformed rows are skipped with a warning; only an unreadable file or a
//! missing required column stops the run.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{AwardTitle, MetadataTitle};

pub const AWARD_COLUMNS: &[&str] = &["year_film", "year_ceremony", "category", "name", "film"];
pub const METADATA_COLUMNS: &[&str] = &["title", "original_title", "release_date"];

/// Date layouts seen in release_date, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error in {dataset} dataset: {source}")]
    Csv {
        dataset: &'static str,
        #[source]
        source: csv::Error,
    },
    #[error("{dataset} dataset is missing required column '{column}'")]
    MissingColumn { dataset: &'static str, column: String },
}

// ============================================================================
// Rows
// ============================================================================

/// One award nomination. Extra columns in the file are ignored.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AwardRow {
    pub year_film: i32,
    pub year_ceremony: i32,
    #[serde(default)]
    pub ceremony: Option<u32>,
    pub category: String,
    #[serde(default)]
    pub name: Option<String>,
    pub film: Option<String>,
    #[serde(default)]
    pub winner: Option<String>,
}

/// The three metadata columns the matcher needs.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MetadataRow {
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
}

/// Rows read from a dataset plus how many were unreadable.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

// ============================================================================
// Loading
// ============================================================================

fn open(path: &Path) -> Result<File, DatasetError> {
    File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_rows<R, T>(reader: R, dataset: &'static str, required: &[&str]) -> Result<Loaded<T>, DatasetError>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|source| DatasetError::Csv { dataset, source })?
        .clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(DatasetError::MissingColumn {
                dataset,
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (line, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                debug!(dataset, line = line + 2, error = %e, "skipping malformed row");
            }
        }
    }

    if skipped > 0 {
        warn!(dataset, skipped, kept = rows.len(), "skipped malformed rows");
    }
    Ok(Loaded { rows, skipped })
}

pub fn read_awards<R: Read>(reader: R) -> Result<Loaded<AwardRow>, DatasetError> {
    read_rows(reader, "award", AWARD_COLUMNS)
}

pub fn read_metadata<R: Read>(reader: R) -> Result<Loaded<MetadataRow>, DatasetError> {
    read_rows(reader, "metadata", METADATA_COLUMNS)
}

pub fn load_awards(path: &Path) -> Result<Loaded<AwardRow>, DatasetError> {
    read_awards(open(path)?)
}

pub fn load_metadata(path: &Path) -> Result<Loaded<MetadataRow>, DatasetError> {
    read_metadata(open(path)?)
}

/// Write award rows back out as CSV.
pub fn write_awards<W: Write>(writer: W, rows: &[AwardRow]) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer
            .serialize(row)
            .map_err(|source| DatasetError::Csv { dataset: "award", source })?;
    }
    writer.flush().map_err(|source| DatasetError::Csv {
        dataset: "award",
        source: source.into(),
    })
}

pub fn save_awards(path: &Path, rows: &[AwardRow]) -> Result<(), DatasetError> {
    let file = File::create(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_awards(file, rows)
}

// ============================================================================
// Conversion
// ============================================================================

/// Release year of a catalog date string, `None` if unparseable.
pub fn release_year(date: &str) -> Option<i32> {
    let date = date.trim();
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(date, format) {
            return Some(parsed.year());
        }
    }
    // Bare year
    if date.len() == 4 && date.chars().all(|c| c.is_ascii_digit()) {
        return date.parse().ok();
    }
    None
}

/// Award rows as matcher input; `row` is the position in `rows`.
pub fn award_titles(rows: &[AwardRow]) -> Vec<AwardTitle> {
    rows.iter()
        .enumerate()
        .map(|(row, award)| AwardTitle {
            row,
            film: award.film.clone(),
            year: award.year_film,
        })
        .collect()
}

/// Metadata rows with a usable release year, plus the count dropped for lacking one.
pub fn metadata_titles(rows: &[MetadataRow]) -> (Vec<MetadataTitle>, usize) {
    let mut titles = Vec::with_capacity(rows.len());
    let mut no_year = 0;
    for row in rows {
        match row.release_date.as_deref().and_then(release_year) {
            Some(year) => titles.push(MetadataTitle {
                title: row.title.clone(),
                original_title: row.original_title.clone(),
                year,
            }),
            None => no_year += 1,
        }
    }
    (titles, no_year)
}
