//! Query facade over one parsed document.

use std::path::{Path, PathBuf};

use strsim::normalized_levenshtein;

use crate::anchors::{normalize_obsidian_text, percent_decode};
use crate::model::{Anchor, AnchorKind, Heading, Link};

/// Immutable parse result for a single file, exposing anchor and section
/// queries without leaking the raw shape.
#[derive(Clone, Debug)]
pub struct ParsedDocument {
    file_path: PathBuf,
    content: String,
    links: Vec<Link>,
    anchors: Vec<Anchor>,
    headings: Vec<Heading>,
    line_offsets: Vec<usize>,
}

impl ParsedDocument {
    pub(crate) fn new(
        file_path: PathBuf,
        content: String,
        links: Vec<Link>,
        anchors: Vec<Anchor>,
        headings: Vec<Heading>,
        line_offsets: Vec<usize>,
    ) -> Self {
        ParsedDocument {
            file_path,
            content,
            links,
            anchors,
            headings,
            line_offsets,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn headings(&self) -> &[Heading] {
        &self.headings
    }

    pub fn line_offsets(&self) -> &[usize] {
        &self.line_offsets
    }

    /// Four-level anchor match: exact id, header URL-encoded id, both
    /// sides URL-decoded, and finally Obsidian-normalised heading text
    /// against the decoded input.
    pub fn has_anchor(&self, search_anchor: &str) -> bool {
        if self.anchors.iter().any(|anchor| anchor.id == search_anchor) {
            return true;
        }

        if self
            .anchors
            .iter()
            .any(|anchor| anchor.url_encoded_id.as_deref() == Some(search_anchor))
        {
            return true;
        }

        let decoded = percent_decode(search_anchor);
        if self.anchors.iter().any(|anchor| {
            percent_decode(&anchor.id) == decoded
                || anchor
                    .url_encoded_id
                    .as_deref()
                    .map(|encoded| percent_decode(encoded) == decoded)
                    .unwrap_or(false)
        }) {
            return true;
        }

        self.anchors
            .iter()
            .filter(|anchor| anchor.kind == AnchorKind::Header)
            .any(|anchor| normalize_obsidian_text(&anchor.raw_text) == decoded)
    }

    /// Rank known anchors against `search_anchor`, case-insensitively,
    /// preferring substring containment over edit distance.
    pub fn find_similar_anchors(&self, search_anchor: &str, limit: usize) -> Vec<String> {
        let needle = percent_decode(search_anchor).to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &str)> = Vec::new();
        for anchor in &self.anchors {
            for candidate in [anchor.id.as_str(), anchor.raw_text.as_str()] {
                let hay = candidate.to_lowercase();
                let score = if hay.contains(&needle) || needle.contains(&hay) {
                    1.0
                } else {
                    normalized_levenshtein(&needle, &hay)
                };
                if score > 0.4 {
                    scored.push((score, candidate));
                }
            }
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut seen = Vec::new();
        for (_, candidate) in scored {
            if !seen.iter().any(|existing: &String| existing == candidate) {
                seen.push(candidate.to_string());
            }
            if seen.len() == limit {
                break;
            }
        }
        seen
    }

    /// Extract the section under `heading_text`: everything from the
    /// heading up to, but not including, the next heading of equal or
    /// higher level. Trailing blank lines collapse to one newline.
    pub fn extract_section(&self, heading_text: &str, level: Option<u32>) -> Option<String> {
        let heading = self.find_heading(heading_text, level)?;
        let lines: Vec<&str> = self.content.split('\n').collect();

        let start = heading.line.saturating_sub(1);
        let end = self
            .headings
            .iter()
            .find(|next| next.line > heading.line && next.level <= heading.level)
            .map(|next| next.line.saturating_sub(1))
            .unwrap_or(lines.len());

        let mut section: Vec<&str> = lines[start..end.min(lines.len())].to_vec();
        while section
            .last()
            .map(|line| line.trim().is_empty())
            .unwrap_or(false)
        {
            section.pop();
        }
        if section.is_empty() {
            return None;
        }

        let mut text = section.join("\n");
        text.push('\n');
        Some(text)
    }

    /// Extract the smallest block-level unit carrying the given block id
    /// (leading `^` tolerated): the paragraph or list item around the
    /// anchor, bounded by blank lines and headings.
    pub fn extract_block(&self, block_id: &str) -> Option<String> {
        let id = block_id.trim_start_matches('^');
        let anchor = self
            .anchors
            .iter()
            .find(|anchor| anchor.kind == AnchorKind::Block && anchor.id == id)?;

        let lines: Vec<&str> = self.content.split('\n').collect();
        let mut target = anchor.line.saturating_sub(1);
        if target >= lines.len() {
            return None;
        }

        // A marker alone on its line addresses the block above it.
        if strip_block_marker(lines[target]).trim().is_empty() {
            while target > 0 && lines[target - 1].trim().is_empty() {
                target -= 1;
            }
            if target == 0 {
                return None;
            }
            target -= 1;
        }

        if is_list_item(lines[target]) {
            return Some(strip_block_marker(lines[target]).trim_end().to_string());
        }

        let boundary = |line: &str| line.trim().is_empty() || is_heading_line(line);
        let mut start = target;
        while start > 0 && !boundary(lines[start - 1]) {
            start -= 1;
        }
        let mut end = target;
        while end + 1 < lines.len() && !boundary(lines[end + 1]) {
            end += 1;
        }

        let block: Vec<String> = lines[start..=end]
            .iter()
            .map(|line| strip_block_marker(line).trim_end().to_string())
            .collect();
        Some(block.join("\n"))
    }

    /// The whole document, unchanged.
    pub fn extract_full_content(&self) -> &str {
        &self.content
    }

    fn find_heading(&self, heading_text: &str, level: Option<u32>) -> Option<&Heading> {
        let by_level =
            |heading: &&Heading| level.map(|wanted| heading.level == wanted).unwrap_or(true);

        if let Some(exact) = self
            .headings
            .iter()
            .filter(by_level)
            .find(|heading| heading.text == heading_text)
        {
            return Some(exact);
        }

        let wanted = normalize_obsidian_text(heading_text);
        self.headings
            .iter()
            .filter(by_level)
            .find(|heading| normalize_obsidian_text(&heading.text) == wanted)
    }
}

/// Drop a trailing ` ^block-id` marker from a line.
fn strip_block_marker(line: &str) -> &str {
    let trimmed = line.trim_end();
    if let Some(idx) = trimmed.rfind('^') {
        let tail = &trimmed[idx + 1..];
        let valid = !tail.is_empty()
            && tail
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        let preceded = idx == 0
            || trimmed[..idx]
                .chars()
                .next_back()
                .map(char::is_whitespace)
                .unwrap_or(true);
        if valid && preceded {
            return trimmed[..idx].trim_end();
        }
    }
    trimmed
}

fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with("+ ") {
        return true;
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with(". ")
}

fn is_heading_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|ch| *ch == '#').count();
    (1..=6).contains(&hashes)
        && trimmed[hashes..]
            .chars()
            .next()
            .map(char::is_whitespace)
            .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MarkdownParser;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn parse(content: &str) -> ParsedDocument {
        MarkdownParser::new().parse_str(Path::new("/vault/b.md"), content)
    }

    #[test]
    fn section_extraction_stops_before_sibling_heading() {
        let doc = parse("## Introduction\n\nbody\n\n## Next\n\nmore\n");
        assert_eq!(
            doc.extract_section("Introduction", None).as_deref(),
            Some("## Introduction\n\nbody\n")
        );
    }

    #[test]
    fn section_extraction_keeps_deeper_headings() {
        let doc = parse("# Top\n\n## Child\n\ntext\n\n# Sibling\n");
        assert_eq!(
            doc.extract_section("Top", None).as_deref(),
            Some("# Top\n\n## Child\n\ntext\n")
        );
    }

    #[test]
    fn section_matches_through_obsidian_normalisation() {
        let doc = parse("## Story 1.5: Implement Cache\n\ncache body\n");
        let section = doc
            .extract_section("Story 1.5 Implement Cache", None)
            .expect("normalised match");
        assert!(section.contains("cache body"));
    }

    #[test]
    fn anchor_match_levels() {
        let doc = parse("## Story 1.5: Implement Cache\n\n## ADR-006: Title\n");
        assert!(doc.has_anchor("Story 1.5: Implement Cache"));
        assert!(doc.has_anchor("Story%201.5%20Implement%20Cache"));
        assert!(doc.has_anchor("ADR-006%20Title"));
        assert!(!doc.has_anchor("Story 9.9"));
    }

    #[test]
    fn url_encoded_special_characters_decode_before_matching() {
        let doc = parse("## Before … After\n");
        assert!(doc.has_anchor("Before%20%E2%80%A6%20After"));
    }

    #[test]
    fn block_extraction_returns_enclosing_paragraph() {
        let doc = parse("intro\n\nFirst line.\nSecond line. ^par-ref\n\nafter\n");
        assert_eq!(
            doc.extract_block("^par-ref").as_deref(),
            Some("First line.\nSecond line.")
        );
        assert_eq!(doc.extract_block("par-ref"), doc.extract_block("^par-ref"));
    }

    #[test]
    fn block_extraction_handles_list_items() {
        let doc = parse("- first\n- second item ^li-ref\n- third\n");
        assert_eq!(doc.extract_block("li-ref").as_deref(), Some("- second item"));
    }

    #[test]
    fn standalone_marker_addresses_previous_block() {
        let doc = parse("A paragraph of text.\n\n^lonely\n\nnext\n");
        assert_eq!(
            doc.extract_block("lonely").as_deref(),
            Some("A paragraph of text.")
        );
    }

    #[test]
    fn missing_block_is_none() {
        let doc = parse("nothing here\n");
        assert_eq!(doc.extract_block("ghost"), None);
    }

    #[test]
    fn similar_anchors_rank_substrings_first() {
        let doc = parse("## Implement Cache\n\n## Implementation Notes\n\n## Unrelated\n");
        let similar = doc.find_similar_anchors("implement", 5);
        assert!(!similar.is_empty());
        assert!(similar[0].to_lowercase().contains("implement"));
        assert!(similar.len() <= 5);
    }

    #[test]
    fn full_content_is_unchanged() {
        let content = "# A\n\nbody\n";
        let doc = parse(content);
        assert_eq!(doc.extract_full_content(), content);
    }
}
