//! Basename → absolute path index over a scope folder.

use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use ignore::gitignore::Gitignore;
use tracing::warn;
use walkdir::WalkDir;

use crate::paths::is_markdown_path;

const IGNORE_FILE_NAME: &str = ".mdcite-ignore";

/// Filename index letting links written with only a basename resolve.
/// Built once per run and read-only thereafter.
pub struct FileCache {
    scope_folder: PathBuf,
    real_scope_folder: PathBuf,
    by_name: HashMap<String, PathBuf>,
    duplicates: HashSet<String>,
    files: Vec<PathBuf>,
}

/// Summary returned by [`FileCache::build`] for reporting.
#[derive(Clone, Debug)]
pub struct FileCacheStats {
    pub total_files: usize,
    pub duplicates: Vec<String>,
    pub scope_folder: PathBuf,
    pub real_scope_folder: PathBuf,
}

/// Outcome of a basename lookup.
#[derive(Clone, Debug)]
pub enum FileResolution {
    Found {
        path: PathBuf,
        fuzzy: bool,
        corrected: Option<String>,
        message: Option<String>,
    },
    NotFound {
        reason: ResolveFailure,
        message: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveFailure {
    Duplicate,
    DuplicateFuzzy,
    NotFound,
}

impl FileCache {
    /// Walk `scope` recursively, following symlinks, indexing Markdown
    /// files by basename. The first occurrence of a basename wins;
    /// conflicting names go into the duplicate set. Unreadable entries
    /// are logged and skipped, never fatal.
    pub fn build(scope: &Path, exclude: Option<&GlobSet>) -> io::Result<FileCache> {
        // Realpath at the root keeps symlink cycles from looping below.
        let real_scope = fs::canonicalize(scope)?;
        let ignore_filter = load_ignore_filter(&real_scope);

        let mut by_name: HashMap<String, PathBuf> = HashMap::new();
        let mut duplicates: HashSet<String> = HashSet::new();
        let mut files: Vec<PathBuf> = Vec::new();

        let mut walker = WalkDir::new(&real_scope).follow_links(true).into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(scope = %real_scope.display(), "skipping unreadable entry: {err}");
                    continue;
                }
            };

            let path = entry.path();
            if entry.file_type().is_dir() {
                if is_filtered(path, &real_scope, ignore_filter.as_ref(), exclude, true) {
                    walker.skip_current_dir();
                }
                continue;
            }

            let Some(name) = path.file_name().and_then(OsStr::to_str) else {
                continue;
            };
            if !is_markdown_path(name) {
                continue;
            }
            if is_filtered(path, &real_scope, ignore_filter.as_ref(), exclude, false) {
                continue;
            }

            files.push(path.to_path_buf());
            if by_name.contains_key(name) {
                duplicates.insert(name.to_string());
            } else {
                by_name.insert(name.to_string(), path.to_path_buf());
            }
        }

        files.sort();
        Ok(FileCache {
            scope_folder: scope.to_path_buf(),
            real_scope_folder: real_scope,
            by_name,
            duplicates,
            files,
        })
    }

    /// Every indexed Markdown file, sorted, as absolute paths.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn stats(&self) -> FileCacheStats {
        let mut duplicates: Vec<String> = self.duplicates.iter().cloned().collect();
        duplicates.sort();
        FileCacheStats {
            total_files: self.files.len(),
            duplicates,
            scope_folder: self.scope_folder.clone(),
            real_scope_folder: self.real_scope_folder.clone(),
        }
    }

    /// Look up a filename: exact basename first (ambiguous names fail),
    /// then a case-insensitive match on the stem.
    pub fn resolve(&self, filename: &str) -> FileResolution {
        let name = Path::new(filename)
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or(filename);

        if self.duplicates.contains(name) {
            return FileResolution::NotFound {
                reason: ResolveFailure::Duplicate,
                message: format!(
                    "filename '{name}' is ambiguous within {}",
                    self.scope_folder.display()
                ),
            };
        }

        if let Some(path) = self.by_name.get(name) {
            return FileResolution::Found {
                path: path.clone(),
                fuzzy: false,
                corrected: None,
                message: None,
            };
        }

        let needle = stem_lower(name);
        let mut matches: Vec<(&String, &PathBuf)> = self
            .by_name
            .iter()
            .filter(|(candidate, _)| stem_lower(candidate) == needle)
            .collect();
        matches.sort_by(|a, b| a.0.cmp(b.0));

        match matches.as_slice() {
            [] => FileResolution::NotFound {
                reason: ResolveFailure::NotFound,
                message: format!(
                    "'{name}' not found within {}",
                    self.scope_folder.display()
                ),
            },
            [(candidate, path)] => FileResolution::Found {
                path: (*path).clone(),
                fuzzy: true,
                corrected: Some((*candidate).clone()),
                message: Some(format!("resolved '{name}' to '{candidate}' by fuzzy match")),
            },
            _ => FileResolution::NotFound {
                reason: ResolveFailure::DuplicateFuzzy,
                message: format!(
                    "'{name}' fuzzy-matches multiple files within {}",
                    self.scope_folder.display()
                ),
            },
        }
    }
}

fn load_ignore_filter(root: &Path) -> Option<Gitignore> {
    let ignore_path = root.join(IGNORE_FILE_NAME);
    if !ignore_path.exists() {
        return None;
    }
    let (filter, error) = Gitignore::new(ignore_path);
    if error.is_some() {
        None
    } else {
        Some(filter)
    }
}

fn is_filtered(
    path: &Path,
    root: &Path,
    ignore_filter: Option<&Gitignore>,
    exclude: Option<&GlobSet>,
    is_dir: bool,
) -> bool {
    if let Some(filter) = ignore_filter {
        if filter.matched_path_or_any_parents(path, is_dir).is_ignore() {
            return true;
        }
    }
    if let Some(exclude) = exclude {
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude.is_match(relative) {
            return true;
        }
    }
    false
}

fn stem_lower(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or(name)
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, contents).expect("write file");
    }

    #[test]
    fn indexes_by_basename_and_counts_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(temp.path(), "a/guide.md", "# G\n");
        write(temp.path(), "b/faq.md", "# F\n");
        write(temp.path(), "b/skip.txt", "not markdown");

        let cache = FileCache::build(temp.path(), None).expect("build");
        let stats = cache.stats();
        assert_eq!(stats.total_files, 2);
        assert!(stats.duplicates.is_empty());

        match cache.resolve("faq.md") {
            FileResolution::Found { path, fuzzy, .. } => {
                assert!(path.ends_with("b/faq.md"));
                assert!(!fuzzy);
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[test]
    fn duplicate_basenames_are_ambiguous() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(temp.path(), "a/notes.md", "# A\n");
        write(temp.path(), "b/notes.md", "# B\n");

        let cache = FileCache::build(temp.path(), None).expect("build");
        assert_eq!(cache.stats().duplicates, vec!["notes.md".to_string()]);

        match cache.resolve("notes.md") {
            FileResolution::NotFound { reason, .. } => {
                assert_eq!(reason, ResolveFailure::Duplicate);
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[test]
    fn fuzzy_match_is_case_insensitive_on_the_stem() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(temp.path(), "docs/Weekly Notes.md", "# W\n");

        let cache = FileCache::build(temp.path(), None).expect("build");
        match cache.resolve("weekly notes.md") {
            FileResolution::Found {
                fuzzy, corrected, ..
            } => {
                assert!(fuzzy);
                assert_eq!(corrected.as_deref(), Some("Weekly Notes.md"));
            }
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[test]
    fn ignore_file_prunes_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(temp.path(), ".mdcite-ignore", "archive/\n");
        write(temp.path(), "archive/old.md", "# Old\n");
        write(temp.path(), "current.md", "# Now\n");

        let cache = FileCache::build(temp.path(), None).expect("build");
        assert_eq!(cache.stats().total_files, 1);
        assert!(matches!(
            cache.resolve("old.md"),
            FileResolution::NotFound { .. }
        ));
    }

    #[test]
    fn missing_name_reports_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        write(temp.path(), "one.md", "# 1\n");
        let cache = FileCache::build(temp.path(), None).expect("build");
        assert!(matches!(
            cache.resolve("ghost.md"),
            FileResolution::NotFound {
                reason: ResolveFailure::NotFound,
                ..
            }
        ));
    }
}
