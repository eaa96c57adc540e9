//! Shared test harness utilities for mdcite crates.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Temporary Markdown corpus rooted in its own directory.
pub struct Corpus {
    dir: TempDir,
}

impl Corpus {
    pub fn new() -> Self {
        Corpus {
            dir: TempDir::new().expect("create corpus tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file under the corpus root, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let absolute = self.dir.path().join(relative);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(&absolute, contents).expect("write file");
        absolute
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }
}

impl Default for Corpus {
    fn default() -> Self {
        Corpus::new()
    }
}
