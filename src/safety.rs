//! Guards against overwriting an input dataset with reconciliation output.

use anyhow::{bail, Result};
use std::path::Path;

/// Name fragments of the award and metadata source files.
const SOURCE_PATTERNS: &[&str] = &["the_oscar_award", "movies_metadata"];

/// Check that `output` can be deleted and recreated.
///
/// The file name must contain `required_pattern` (e.g. "reconciled") and no
/// source dataset name, and the path must not resolve to any of
/// `source_paths`. Existing files are compared by canonical path, so
/// `data/../awards.csv` and `awards.csv` count as the same file.
pub fn validate_output_path(output: &Path, required_pattern: &str, source_paths: &[&Path]) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    // Source names are rejected even alongside the required pattern
    if let Some(pattern) = SOURCE_PATTERNS.iter().find(|p| output_name.contains(*p)) {
        bail!(
            "Safety check failed: output '{}' matches source dataset pattern '{}'",
            output.display(),
            pattern
        );
    }

    let resolved_output = output.canonicalize().ok();
    for source in source_paths {
        let same_file = output == *source
            || matches!((&resolved_output, source.canonicalize()), (Some(a), Ok(b)) if *a == b);
        if same_file {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    Ok(())
}
