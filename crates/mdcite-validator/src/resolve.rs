//! Cross-document target resolution pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use mdcite_parser::{
    normalize_path, percent_decode, resolve_from_dir, FileCache, FileResolution,
};

/// Successful resolution, annotated with how the file was found.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedTarget {
    pub absolute: PathBuf,
    pub fuzzy: bool,
    pub corrected: Option<String>,
    pub note: Option<String>,
}

/// Every strategy failed; carries the message for the error verdict.
#[derive(Clone, Debug)]
pub(crate) struct ResolveError {
    pub message: String,
    pub suggestion: Option<String>,
}

/// Shape of an Obsidian vault-absolute path: a bare top segment followed
/// by a slash, written as if relative to the top of the collection.
pub(crate) fn vault_absolute_pattern() -> Regex {
    Regex::new(r"^[A-Za-z0-9_-]+/").expect("vault-absolute pattern")
}

/// Try the resolution strategies in order until one finds an existing
/// file: decoded raw path, raw path as written, vault-absolute ancestor
/// walk, realpath'd source, and finally the filename cache.
pub(crate) fn resolve_target(
    raw: &str,
    source_absolute: &Path,
    file_cache: &FileCache,
    vault_pattern: &Regex,
) -> Result<ResolvedTarget, ResolveError> {
    let source_dir = source_absolute.parent().unwrap_or_else(|| Path::new("."));
    let decoded = percent_decode(raw);

    let candidate = resolve_from_dir(source_dir, &decoded);
    if candidate.is_file() {
        return Ok(direct(candidate));
    }

    if decoded != raw {
        let candidate = resolve_from_dir(source_dir, raw);
        if candidate.is_file() {
            return Ok(direct(candidate));
        }
    }

    if vault_pattern.is_match(&decoded) {
        let mut ancestor = source_dir.parent();
        while let Some(dir) = ancestor {
            let candidate = normalize_path(dir.join(&decoded));
            if candidate.is_file() {
                debug!(target = raw, root = %dir.display(), "resolved via ancestor walk");
                return Ok(direct(candidate));
            }
            ancestor = dir.parent();
        }
    }

    if let Ok(real_source) = fs::canonicalize(source_absolute) {
        if real_source != source_absolute {
            if let Some(real_dir) = real_source.parent() {
                let candidate = resolve_from_dir(real_dir, &decoded);
                if candidate.is_file() {
                    return Ok(direct(candidate));
                }
            }
        }
    }

    match file_cache.resolve(&decoded) {
        FileResolution::Found {
            path,
            fuzzy,
            corrected,
            message,
        } => {
            debug!(target = raw, resolved = %path.display(), fuzzy, "resolved via filename cache");
            Ok(ResolvedTarget {
                absolute: path,
                fuzzy,
                corrected,
                note: message,
            })
        }
        FileResolution::NotFound { message, .. } => Err(ResolveError {
            message: format!("File not found: '{raw}'"),
            suggestion: Some(message),
        }),
    }
}

fn direct(absolute: PathBuf) -> ResolvedTarget {
    ResolvedTarget {
        absolute,
        fuzzy: false,
        corrected: None,
        note: None,
    }
}
