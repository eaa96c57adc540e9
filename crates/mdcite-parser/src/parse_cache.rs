//! Process-scoped parse-once cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

use crate::document::ParsedDocument;
use crate::parser::{MarkdownParser, ParseError};
use crate::paths::normalize_path;

type ParseSlot = Arc<OnceLock<Result<Arc<ParsedDocument>, ParseError>>>;

/// Guarantees at most one parse per absolute path for the cache lifetime.
///
/// The map stores per-key once-cells rather than values: a miss installs
/// the slot under the map lock and initialises it outside, so concurrent
/// callers hitting the same path block on the same initialisation instead
/// of racing to parse twice. Failed parses stay cached; every caller of a
/// bad path observes the same error.
pub struct ParsedFileCache {
    parser: MarkdownParser,
    slots: Mutex<HashMap<PathBuf, ParseSlot>>,
}

impl ParsedFileCache {
    pub fn new() -> Self {
        ParsedFileCache {
            parser: MarkdownParser::new(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Parse `path` or return the cached result. Every caller receives
    /// the same [`ParsedDocument`] instance for a given path.
    pub fn resolve(&self, path: &Path) -> Result<Arc<ParsedDocument>, ParseError> {
        let key = normalize_path(path.to_path_buf());

        let slot = {
            let mut slots = self.slots.lock().expect("parse cache poisoned");
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };

        slot.get_or_init(|| {
            debug!(path = %key.display(), "parsing");
            self.parser.parse_file(&key).map(Arc::new)
        })
        .clone()
    }

    /// Number of paths with a settled parse, successful or failed.
    pub fn len(&self) -> usize {
        self.slots.lock().expect("parse cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ParsedFileCache {
    fn default() -> Self {
        ParsedFileCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;

    #[test]
    fn same_instance_for_every_caller() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("doc.md");
        fs::write(&path, "# A\n").expect("write");

        let cache = ParsedFileCache::new();
        let first = cache.resolve(&path).expect("first parse");
        let second = cache.resolve(&path).expect("second parse");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_resolves_share_one_parse() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("doc.md");
        fs::write(&path, "# Shared\n\n[X](./other.md#Anchor)\n").expect("write");

        let cache = Arc::new(ParsedFileCache::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let path = path.clone();
            handles.push(std::thread::spawn(move || cache.resolve(&path).expect("parse")));
        }

        let documents: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("join"))
            .collect();
        for pair in documents.windows(2) {
            assert!(Arc::ptr_eq(&pair[0], &pair[1]));
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_stay_cached() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("missing.md");

        let cache = ParsedFileCache::new();
        let first = cache.resolve(&missing).expect_err("missing file");
        let second = cache.resolve(&missing).expect_err("still missing");
        assert!(first.is_not_found());
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(cache.len(), 1);
    }
}
