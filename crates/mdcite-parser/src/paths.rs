//! Path arithmetic for link targets.
//!
//! Targets are written with forward slashes against Unix-native source
//! files; every resolution in the crate goes through [`resolve_from_dir`]
//! so the link factory and the validator cannot disagree on how a written
//! path maps to the filesystem.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

const EXTERNAL_SCHEMES: [&str; 5] = ["http:", "https:", "mailto:", "tel:", "data:"];

/// True when the target leaves the corpus entirely (web, mail, data URIs).
pub fn is_external(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    EXTERNAL_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// True when the written target names a Markdown document.
pub fn is_markdown_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"))
        .unwrap_or(false)
}

/// Split a written target at its first `#` into path and fragment.
/// `#anchor` alone yields an empty path, the internal-link shape.
pub fn split_link_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('#') {
        Some((path, anchor)) => (path, Some(anchor)),
        None => (target, None),
    }
}

/// Collapse `.` and `..` segments without touching the filesystem, so a
/// written `../c/b.md` and its resolved form compare equal as cache keys.
/// Leading `..` segments of a relative path are kept; `..` at the root is
/// dropped.
pub fn normalize_path(path: PathBuf) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last().copied() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().map(|part| part.as_os_str()).collect()
}

/// Resolve a written link path against the directory of its source file,
/// the one rule every link in the corpus follows. Absolute targets pass
/// through untouched (modulo normalisation).
pub fn resolve_from_dir(source_dir: &Path, target: &str) -> PathBuf {
    let candidate = Path::new(target);
    if candidate.is_absolute() {
        normalize_path(candidate.to_path_buf())
    } else {
        normalize_path(source_dir.join(candidate))
    }
}

/// Walk from `from` up to the shared ancestor and back down to `to`, the
/// form a corrected link path is written in. `None` when one side is
/// absolute and the other is not, so callers never mix the two.
pub fn relative_path(from: &Path, to: &Path) -> Option<PathBuf> {
    if from.is_absolute() != to.is_absolute() {
        return None;
    }

    let from: Vec<Component<'_>> = from
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    let to: Vec<Component<'_>> = to
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();

    let shared = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for component in &from[shared..] {
        if !matches!(component, Component::RootDir) {
            relative.push("..");
        }
    }
    for component in &to[shared..] {
        relative.push(component.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    Some(relative)
}

/// Render a path the way link targets are written, forward slashes only.
pub fn path_to_slash(path: &Path) -> String {
    let mut rendered = String::new();
    for component in path.components() {
        if !rendered.is_empty() {
            rendered.push('/');
        }
        rendered.push_str(&component.as_os_str().to_string_lossy());
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_anchor() {
        assert_eq!(split_link_target("a.md#intro"), ("a.md", Some("intro")));
        assert_eq!(split_link_target("#intro"), ("", Some("intro")));
        assert_eq!(split_link_target("a.md"), ("a.md", None));
    }

    #[test]
    fn resolves_relative_targets_against_source_dir() {
        let resolved = resolve_from_dir(Path::new("/vault/a"), "../c/b.md");
        assert_eq!(resolved, PathBuf::from("/vault/c/b.md"));
    }

    #[test]
    fn normalisation_keeps_leading_parent_segments() {
        assert_eq!(
            normalize_path(PathBuf::from("../shared/./doc.md")),
            PathBuf::from("../shared/doc.md")
        );
        assert_eq!(normalize_path(PathBuf::from("/a/../b.md")), PathBuf::from("/b.md"));
    }

    #[test]
    fn relative_path_walks_up_shared_ancestors() {
        let relative = relative_path(Path::new("/vault/a"), Path::new("/vault/c/b.md"));
        assert_eq!(relative, Some(PathBuf::from("../c/b.md")));
        assert_eq!(
            relative_path(Path::new("/vault/a"), Path::new("/vault/a")),
            Some(PathBuf::from("."))
        );
    }

    #[test]
    fn relative_path_refuses_mixed_absolute_and_relative() {
        assert_eq!(relative_path(Path::new("a"), Path::new("/vault/b.md")), None);
    }

    #[test]
    fn external_schemes_are_flagged() {
        assert!(is_external("https://example.com"));
        assert!(is_external("mailto:dev@example.com"));
        assert!(!is_external("./guide.md"));
    }

    #[test]
    fn markdown_extensions_match_case_insensitively() {
        assert!(is_markdown_path("notes.md"));
        assert!(is_markdown_path("NOTES.MD"));
        assert!(is_markdown_path("guide.markdown"));
        assert!(!is_markdown_path("diagram.png"));
        assert!(!is_markdown_path("specs/overview"));
    }

    #[test]
    fn slash_rendering_matches_written_links() {
        assert_eq!(path_to_slash(Path::new("../c/b.md")), "../c/b.md");
        assert_eq!(path_to_slash(Path::new("docs/guide.md")), "docs/guide.md");
    }
}
