//! In-place application of validated path conversions.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use similar::TextDiff;

use mdcite_parser::Link;

/// Result of a fix pass: how many rewrites landed and their diff.
pub(crate) struct FixOutcome {
    pub applied: usize,
    pub diff: Option<String>,
}

/// Rewrite link paths whose validation carried a `path_conversion`
/// recommendation. Only the link occurrence itself is touched; the file
/// is written atomically with a `.bak` alongside.
pub(crate) fn apply_path_fixes(source: &Path, links: &[Link]) -> Result<FixOutcome> {
    let contents = fs::read_to_string(source)
        .with_context(|| format!("read {}", source.display()))?;
    let mut lines: Vec<String> = contents.split('\n').map(str::to_string).collect();
    let mut applied = 0usize;

    for link in links {
        let Some(conversion) = link
            .validation
            .as_ref()
            .and_then(|validation| validation.path_conversion())
        else {
            continue;
        };

        let Some(line) = lines.get_mut(link.line.saturating_sub(1)) else {
            continue;
        };
        let updated_match = link
            .full_match
            .replace(&conversion.original, &conversion.recommended);
        if updated_match == link.full_match || !line.contains(&link.full_match) {
            continue;
        }
        *line = line.replacen(&link.full_match, &updated_match, 1);
        applied += 1;
    }

    if applied == 0 {
        return Ok(FixOutcome {
            applied,
            diff: None,
        });
    }

    let updated = lines.join("\n");
    let diff = build_diff(source, &contents, &updated);
    write_atomic(source, &updated, true)?;

    Ok(FixOutcome {
        applied,
        diff: Some(diff),
    })
}

fn build_diff(path: &Path, before: &str, after: &str) -> String {
    let old_header = format!("a/{}", path.display());
    let new_header = format!("b/{}", path.display());
    let diff = TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header(&old_header, &new_header)
        .to_string();
    if diff.ends_with('\n') {
        diff
    } else {
        format!("{}\n", diff)
    }
}

fn write_atomic(path: &Path, content: &str, backup: bool) -> Result<()> {
    let tmp_path = unique_tmp_path(path);
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("create {}", tmp_path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("write {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("sync {}", tmp_path.display()))?;
    }

    if backup {
        let backup_path = path.with_extension("bak");
        if let Err(err) = fs::copy(path, &backup_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err).with_context(|| format!("back up {}", path.display()));
        }
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("replace {}", path.display()));
    }

    Ok(())
}

fn unique_tmp_path(path: &Path) -> PathBuf {
    let mut counter = 0u32;
    loop {
        let candidate = if counter == 0 {
            path.with_extension("tmp")
        } else {
            path.with_extension(format!("tmp{counter}"))
        };

        if !candidate.exists() {
            return candidate;
        }

        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use mdcite_parser::{FileCache, ParsedFileCache};
    use mdcite_test_support::Corpus;
    use mdcite_validator::CitationValidator;

    #[test]
    fn applies_recommended_path_and_backs_up() {
        let corpus = Corpus::new();
        let source = corpus.write("a/a.md", "[X](b.md)\n");
        corpus.write("c/b.md", "# B\n");

        let file_cache = FileCache::build(corpus.root(), None).expect("build cache");
        let validator =
            CitationValidator::new(Arc::new(ParsedFileCache::new()), Arc::new(file_cache));
        let result = validator.validate_file(&source).expect("validate");

        let outcome = apply_path_fixes(&source, &result.links).expect("fix");
        assert_eq!(outcome.applied, 1);
        assert!(outcome.diff.expect("diff").contains("../c/b.md"));

        let rewritten = fs::read_to_string(&source).expect("read back");
        assert_eq!(rewritten, "[X](../c/b.md)\n");
        assert_eq!(
            fs::read_to_string(source.with_extension("bak")).expect("backup"),
            "[X](b.md)\n"
        );
    }

    #[test]
    fn no_conversions_means_no_write() {
        let corpus = Corpus::new();
        let source = corpus.write("a.md", "[X](./b.md#Intro)\n");
        corpus.write("b.md", "## Intro\n\nbody\n");

        let file_cache = FileCache::build(corpus.root(), None).expect("build cache");
        let validator =
            CitationValidator::new(Arc::new(ParsedFileCache::new()), Arc::new(file_cache));
        let result = validator.validate_file(&source).expect("validate");

        let outcome = apply_path_fixes(&source, &result.links).expect("fix");
        assert_eq!(outcome.applied, 0);
        assert!(!source.with_extension("bak").exists());
    }
}
