//! Two-phase Markdown parsing for the Obsidian dialect.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};
use thiserror::Error;
use tracing::debug;

use crate::anchors::{collect_anchors, AnchorPatterns};
use crate::document::ParsedDocument;
use crate::lines::{byte_to_line, compute_line_offsets};
use crate::links::{collect_lexer_links, collect_pattern_links, LinkPatterns};
use crate::model::Heading;
use crate::paths::normalize_path;

/// Errors surfaced while reading a source file.
///
/// Cloneable on purpose: the parse cache stores failures so every caller
/// of the same path observes the same error.
#[derive(Clone, Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {message}")]
    Io {
        path: PathBuf,
        kind: io::ErrorKind,
        message: String,
    },
}

impl ParseError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ParseError::Io {
                kind: io::ErrorKind::NotFound,
                ..
            }
        )
    }
}

/// Extracts links, headings, and anchors from one document at a time.
pub struct MarkdownParser {
    link_patterns: LinkPatterns,
    anchor_patterns: AnchorPatterns,
}

impl MarkdownParser {
    pub fn new() -> Self {
        MarkdownParser {
            link_patterns: LinkPatterns::new(),
            anchor_patterns: AnchorPatterns::new(),
        }
    }

    /// Read and parse `path`. Unreadable files fail fast; malformed
    /// Markdown never does.
    pub fn parse_file(&self, path: &Path) -> Result<ParsedDocument, ParseError> {
        let content = fs::read_to_string(path).map_err(|err| ParseError::Io {
            path: path.to_path_buf(),
            kind: err.kind(),
            message: err.to_string(),
        })?;
        Ok(self.parse_str(path, &content))
    }

    /// Parse already-loaded content attributed to `path`.
    pub fn parse_str(&self, path: &Path, content: &str) -> ParsedDocument {
        let absolute = normalize_path(path.to_path_buf());
        let offsets = compute_line_offsets(content);
        let headings = collect_headings(&self.anchor_patterns, content, &offsets);

        let mut links = collect_lexer_links(&self.link_patterns, content, &offsets, &absolute);
        let mut taken: HashSet<(usize, usize)> =
            links.iter().map(|link| (link.line, link.column)).collect();
        links.extend(collect_pattern_links(
            &self.link_patterns,
            content,
            &absolute,
            &mut taken,
        ));
        links.sort_by(|a, b| (a.line, a.column).cmp(&(b.line, b.column)));

        let anchors = collect_anchors(&self.anchor_patterns, content, &headings);
        debug!(
            path = %absolute.display(),
            links = links.len(),
            anchors = anchors.len(),
            headings = headings.len(),
            "parsed document"
        );

        ParsedDocument::new(
            absolute,
            content.to_string(),
            links,
            anchors,
            headings,
            offsets,
        )
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        MarkdownParser::new()
    }
}

/// Headings straight from the lexer event stream; fenced code can never
/// contribute one. Empty headings are omitted rather than failing. The
/// display text loses any trailing `{#custom-id}` marker; the raw line
/// keeps it for anchor derivation.
fn collect_headings(patterns: &AnchorPatterns, content: &str, offsets: &[usize]) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut pending: Option<(u32, std::ops::Range<usize>)> = None;

    for (event, range) in Parser::new_ext(content, Options::all()).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading(level, _, _)) => {
                pending = Some((heading_depth(level), range));
            }
            Event::End(Tag::Heading(..)) => {
                if let Some((level, range)) = pending.take() {
                    let raw = content[range.clone()].trim_end().to_string();
                    let (_, text) = patterns.split_custom_id(&heading_inner_text(&raw));
                    if text.is_empty() {
                        continue;
                    }
                    headings.push(Heading {
                        level,
                        text,
                        raw,
                        line: byte_to_line(range.start, offsets),
                    });
                }
            }
            _ => {}
        }
    }

    headings
}

fn heading_depth(level: HeadingLevel) -> u32 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Inner text of a heading source line: ATX hashes stripped on both
/// sides, setext underline dropped.
fn heading_inner_text(raw: &str) -> String {
    let first_line = raw.lines().next().unwrap_or_default().trim();
    if let Some(after) = first_line.strip_prefix('#') {
        let after = after.trim_start_matches('#');
        let mut inner = after.trim();
        let stripped = inner.trim_end_matches('#');
        if stripped.len() < inner.len() && stripped.ends_with(char::is_whitespace) {
            inner = stripped.trim_end();
        }
        inner.to_string()
    } else {
        first_line.to_string()
    }
}
