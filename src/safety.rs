//! Safety utilities to prevent accidental loss of fetched source data.
//!
//! These checks help prevent overwriting a crawler dump (which can take
//! hours of rate-limited fetching to rebuild) with merged output.

use anyhow::{bail, Result};
use std::path::Path;

/// File names the fetchers write; output must never replace one of them.
const SOURCE_DUMP_PATTERNS: [&str; 2] = ["food_recalls.json", "food_recall_announcement_photo.json"];

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output filename must contain the required pattern (e.g., "merged")
/// - Output cannot be the same as any of the provided source paths
/// - Output cannot be named like a fetcher dump
///
/// # Arguments
/// * `output` - The output path that will be created/overwritten
/// * `required_pattern` - Pattern that must appear in the output filename (e.g., "merged")
/// * `source_paths` - Slice of source paths that must not match the output
pub fn validate_output_path(
    output: &Path,
    required_pattern: &str,
    source_paths: &[&Path],
) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    for source in source_paths {
        if output == *source || same_file(output, source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    for pattern in SOURCE_DUMP_PATTERNS {
        if output_name == pattern {
            bail!(
                "Safety check failed: output '{}' is named like a source dump ('{}')",
                output.display(),
                pattern
            );
        }
    }

    Ok(())
}

/// Both paths exist and resolve to the same file
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
