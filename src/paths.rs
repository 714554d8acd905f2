use crate::error::{MirrorError, Result};
use std::path::{Path, PathBuf};

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maps a project name onto a single filesystem-safe path segment.
///
/// Every character that is invalid in a path segment on common platforms
/// becomes `_`. Surrounding whitespace and trailing dots are dropped. Names
/// that end up empty or as `.`/`..` are rejected.
pub fn sanitize_project_name(name: &str) -> Result<String> {
    let replaced: String = name
        .trim()
        .chars()
        .map(|c| {
            if INVALID_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let cleaned = replaced
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(MirrorError::Validation(format!(
            "project name '{}' has no usable characters",
            name
        )));
    }

    Ok(cleaned)
}

/// Resolves the mirror directory for `project` as a direct child of `base`.
pub fn mirror_path(base: &Path, project: &str) -> Result<PathBuf> {
    let segment = sanitize_project_name(project)?;
    let path = base.join(&segment);

    // The sanitized segment has no separators, so this only guards against
    // future changes to the sanitizer.
    if path.parent() != Some(base) {
        return Err(MirrorError::Validation(format!(
            "project name '{}' escapes the base directory",
            project
        )));
    }

    Ok(path)
}
