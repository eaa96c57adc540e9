//! Anchor discovery and the shared Obsidian text normalisers.

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::code_spans::{fenced_line_set, in_inline_code};
use crate::model::{Anchor, AnchorKind, Heading};

/// Characters Obsidian refuses inside heading anchors.
const OBSIDIAN_INVALID: [char; 7] = [':', '|', '#', '^', '[', ']', '\\'];

/// Percent-decode a fragment without any further normalisation.
pub fn percent_decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Strip Obsidian-invalid characters and collapse whitespace runs.
pub fn normalize_obsidian_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|ch| !OBSIDIAN_INVALID.contains(ch))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Obsidian-compatible encoded form of a heading: colons removed,
/// whitespace runs replaced with `%20`.
pub fn url_encoded_heading_id(text: &str) -> String {
    let no_colons: String = text.chars().filter(|ch| *ch != ':').collect();
    no_colons.split_whitespace().collect::<Vec<_>>().join("%20")
}

/// Lowercased, hyphen-joined form of a heading text. Tolerated by
/// Obsidian but discouraged; the validator flags it with a warning.
pub fn kebab_case(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|ch| !OBSIDIAN_INVALID.contains(ch))
        .collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

pub(crate) struct AnchorPatterns {
    block: Regex,
    emphasis: Regex,
    custom_id: Regex,
}

impl AnchorPatterns {
    pub(crate) fn new() -> Self {
        AnchorPatterns {
            block: Regex::new(r"\^([A-Za-z0-9][A-Za-z0-9_-]*)").expect("block anchor pattern"),
            emphasis: Regex::new(r"==\*\*([^*=]+)\*\*==").expect("emphasis anchor pattern"),
            custom_id: Regex::new(r"\{#([A-Za-z0-9][A-Za-z0-9_-]*)\}\s*$").expect("custom id pattern"),
        }
    }

    /// Split a heading text into an optional explicit `{#custom-id}` and
    /// the display text without the marker.
    pub(crate) fn split_custom_id(&self, text: &str) -> (Option<String>, String) {
        if let Some(caps) = self.custom_id.captures(text) {
            let id = caps[1].to_string();
            let display = text[..caps.get(0).expect("whole match").start()]
                .trim_end()
                .to_string();
            (Some(id), display)
        } else {
            (None, text.to_string())
        }
    }
}

/// Collect block, emphasis-marked, and header anchors for one document.
///
/// Header anchors are derived from the `headings` array alone; headings
/// are never re-parsed here.
pub(crate) fn collect_anchors(
    patterns: &AnchorPatterns,
    content: &str,
    headings: &[Heading],
) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    let fenced = fenced_line_set(content);

    for (idx, line) in content.split('\n').enumerate() {
        let line_no = idx + 1;
        if fenced.contains(&line_no) {
            continue;
        }

        for caps in patterns.emphasis.captures_iter(line) {
            let whole = caps.get(0).expect("whole match");
            if in_inline_code(line, whole.start()) {
                continue;
            }
            anchors.push(Anchor {
                kind: AnchorKind::Block,
                id: caps[1].trim().to_string(),
                url_encoded_id: None,
                raw_text: whole.as_str().to_string(),
                full_match: whole.as_str().to_string(),
                line: line_no,
                column: whole.start(),
            });
        }

        for caps in patterns.block.captures_iter(line) {
            let whole = caps.get(0).expect("whole match");
            if !preceded_by_whitespace(line, whole.start()) {
                continue;
            }
            if in_inline_code(line, whole.start()) {
                continue;
            }
            if is_semver_tail(&line[whole.end()..]) {
                continue;
            }
            anchors.push(Anchor {
                kind: AnchorKind::Block,
                id: caps[1].to_string(),
                url_encoded_id: None,
                raw_text: caps[1].to_string(),
                full_match: whole.as_str().to_string(),
                line: line_no,
                column: whole.start(),
            });
        }
    }

    for heading in headings {
        // The display text is already stripped; the custom id, if any,
        // still trails the raw source line.
        let (custom, _) = patterns.split_custom_id(heading.raw.trim_end());
        let id = custom.unwrap_or_else(|| heading.text.clone());
        if id.is_empty() {
            continue;
        }
        anchors.push(Anchor {
            kind: AnchorKind::Header,
            url_encoded_id: Some(url_encoded_heading_id(&id)),
            id,
            raw_text: heading.text.clone(),
            full_match: heading.raw.clone(),
            line: heading.line,
            column: 0,
        });
    }

    anchors
}

fn preceded_by_whitespace(line: &str, column: usize) -> bool {
    if column == 0 {
        return true;
    }
    line[..column]
        .chars()
        .next_back()
        .map(char::is_whitespace)
        .unwrap_or(true)
}

/// `^14.0.1` is a semantic version, not a block reference.
fn is_semver_tail(rest: &str) -> bool {
    let mut chars = rest.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('.'), Some(digit)) if digit.is_ascii_digit()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(level: u32, text: &str, raw: &str, line: usize) -> Heading {
        Heading {
            level,
            text: text.to_string(),
            raw: raw.to_string(),
            line,
        }
    }

    #[test]
    fn heading_yields_exactly_one_anchor_with_both_ids() {
        let patterns = AnchorPatterns::new();
        let headings = vec![heading(
            2,
            "Story 1.5: Implement Cache",
            "## Story 1.5: Implement Cache",
            1,
        )];
        let anchors = collect_anchors(&patterns, "## Story 1.5: Implement Cache\n", &headings);

        let headers: Vec<_> = anchors
            .iter()
            .filter(|anchor| anchor.kind == AnchorKind::Header)
            .collect();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].id, "Story 1.5: Implement Cache");
        assert_eq!(
            headers[0].url_encoded_id.as_deref(),
            Some("Story%201.5%20Implement%20Cache")
        );
    }

    #[test]
    fn custom_heading_id_wins() {
        let patterns = AnchorPatterns::new();
        let (id, display) = patterns.split_custom_id("Design Notes {#design}");
        assert_eq!(id.as_deref(), Some("design"));
        assert_eq!(display, "Design Notes");

        let (none, unchanged) = patterns.split_custom_id("Plain Heading");
        assert!(none.is_none());
        assert_eq!(unchanged, "Plain Heading");
    }

    #[test]
    fn line_end_and_midline_block_anchors_are_found() {
        let patterns = AnchorPatterns::new();
        let content = "Some requirement text ^FR1\nInline ^note-ref continues here\n";
        let anchors = collect_anchors(&patterns, content, &[]);
        let ids: Vec<&str> = anchors.iter().map(|anchor| anchor.id.as_str()).collect();
        assert_eq!(ids, vec!["FR1", "note-ref"]);
    }

    #[test]
    fn semver_carets_are_not_anchors() {
        let patterns = AnchorPatterns::new();
        let anchors = collect_anchors(
            &patterns,
            "requires marked@^14.0.1 runtime and pinned ^2.0.3\n",
            &[],
        );
        assert!(anchors.is_empty());
    }

    #[test]
    fn emphasis_marked_header_becomes_block_anchor() {
        let patterns = AnchorPatterns::new();
        let anchors = collect_anchors(&patterns, "==**CitationValidator**== owns this\n", &[]);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].id, "CitationValidator");
        assert_eq!(anchors[0].kind, AnchorKind::Block);
    }

    #[test]
    fn fenced_code_contributes_no_anchors() {
        let patterns = AnchorPatterns::new();
        let anchors = collect_anchors(&patterns, "```\ntext ^not-an-anchor\n```\n", &[]);
        assert!(anchors.is_empty());
    }

    #[test]
    fn obsidian_normaliser_strips_invalid_characters() {
        assert_eq!(normalize_obsidian_text("ADR-006: Title"), "ADR-006 Title");
        assert_eq!(normalize_obsidian_text("A | B [x]"), "A B x");
    }

    #[test]
    fn kebab_form_keeps_dots() {
        assert_eq!(kebab_case("Story 1.5"), "story-1.5");
        assert_eq!(kebab_case("Implement Cache"), "implement-cache");
    }
}
