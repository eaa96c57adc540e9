//! Link extraction: a lexer pass for CommonMark-valid links and a guarded
//! regex pass for the Obsidian-only syntax the lexer rejects.
//!
//! Both passes construct links through the single factory in this module,
//! which alone performs anchor classification and path resolution.

use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;

use pulldown_cmark::{Event, LinkType, Options, Parser, Tag};
use regex::Regex;

use crate::code_spans::{fenced_line_set, in_inline_code};
use crate::lines::{line_col, line_text};
use crate::model::{AnchorKind, ExtractionMarker, Link, LinkKind, LinkScope, SourceRef, TargetRef};
use crate::paths::{is_external, is_markdown_path, relative_path, resolve_from_dir, split_link_target};

pub(crate) struct LinkPatterns {
    md_anchor: Regex,
    md_internal: Regex,
    md_plain: Regex,
    citation: Regex,
    wiki_cross: Regex,
    wiki_internal: Regex,
    caret_ref: Regex,
    marker: Regex,
}

impl LinkPatterns {
    pub(crate) fn new() -> Self {
        LinkPatterns {
            // Anchor may contain spaces, colons, and one level of balanced parens.
            md_anchor: Regex::new(r"\[([^\[\]]*)\]\(([^()\s#]+\.md)#([^()]*(?:\([^()]*\)[^()]*)*)\)")
                .expect("markdown anchor pattern"),
            md_internal: Regex::new(r"\[([^\[\]]*)\]\(#([^()]+)\)").expect("internal pattern"),
            md_plain: Regex::new(r"\[([^\[\]]*)\]\(([^()#\s]+)\)").expect("plain link pattern"),
            citation: Regex::new(r"\[cite:\s*([^\]]+)\]").expect("citation pattern"),
            wiki_cross: Regex::new(
                r"\[\[([^\[\]#|]+\.md)(?:#([^\[\]|]+))?(?:\|([^\[\]]+))?\]\]",
            )
            .expect("wiki cross pattern"),
            wiki_internal: Regex::new(r"\[\[#([^\[\]|]+?)(?:\|([^\[\]]+))?\]\]")
                .expect("wiki internal pattern"),
            caret_ref: Regex::new(r"(?:^|\s)(\^[A-Za-z0-9][A-Za-z0-9_-]*)")
                .expect("caret ref pattern"),
            marker: Regex::new(r"^\s*(%%(.+?)%%|<!--\s*(.+?)\s*-->)").expect("marker pattern"),
        }
    }
}

/// Raw inputs handed to the factory; callers never resolve paths themselves.
struct LinkInput<'a> {
    kind: LinkKind,
    raw_path: &'a str,
    anchor: Option<&'a str>,
    text: Option<String>,
    full_match: String,
    line: usize,
    column: usize,
}

/// The single construction point for [`Link`] values.
fn build_link(
    patterns: &LinkPatterns,
    source_absolute: &Path,
    line_text: &str,
    input: LinkInput<'_>,
) -> Link {
    let anchor = input.anchor.map(str::trim).filter(|anchor| !anchor.is_empty());
    let anchor_type = anchor.map(|anchor| {
        if anchor.starts_with('^') {
            AnchorKind::Block
        } else {
            AnchorKind::Header
        }
    });

    let source_dir = source_absolute.parent().unwrap_or_else(|| Path::new("."));
    let (scope, absolute, relative) = if input.raw_path.is_empty() {
        (LinkScope::Internal, None, None)
    } else {
        let absolute = resolve_from_dir(source_dir, input.raw_path);
        let relative = relative_path(source_dir, &absolute);
        (LinkScope::CrossDocument, Some(absolute), relative)
    };

    let marker_from = input.column + input.full_match.len();
    let extraction_marker = detect_marker(&patterns.marker, line_text, marker_from);

    Link {
        link_type: input.kind,
        scope,
        anchor_type,
        source: SourceRef {
            absolute: source_absolute.to_path_buf(),
        },
        target: TargetRef {
            raw: input.raw_path.to_string(),
            absolute,
            relative,
            anchor: anchor.map(str::to_string),
        },
        text: input.text,
        full_match: input.full_match,
        line: input.line,
        column: input.column,
        extraction_marker,
        validation: None,
    }
}

fn detect_marker(marker: &Regex, line: &str, from: usize) -> Option<ExtractionMarker> {
    let rest = line.get(from..)?;
    let caps = marker.captures(rest)?;
    let full = caps.get(1)?.as_str().to_string();
    let inner = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map(|inner| inner.as_str().trim().to_string())?;
    Some(ExtractionMarker {
        full_match: full,
        inner_text: inner,
    })
}

struct OpenLink {
    dest: String,
    range: Range<usize>,
    text: String,
}

/// Phase A: links the CommonMark lexer accepts. The event stream walks
/// every container (paragraphs, lists, blockquotes) so nothing nested is
/// lost; code blocks and external schemes are skipped.
pub(crate) fn collect_lexer_links(
    patterns: &LinkPatterns,
    content: &str,
    offsets: &[usize],
    source_absolute: &Path,
) -> Vec<Link> {
    let mut links = Vec::new();
    let mut code_depth = 0usize;
    let mut open: Option<OpenLink> = None;

    for (event, range) in Parser::new_ext(content, Options::all()).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(_)) => code_depth += 1,
            Event::End(Tag::CodeBlock(_)) => code_depth = code_depth.saturating_sub(1),
            Event::Start(Tag::Link(link_type, dest, _)) => {
                if code_depth > 0 {
                    continue;
                }
                if matches!(link_type, LinkType::Autolink | LinkType::Email) {
                    continue;
                }
                if dest.is_empty() || is_external(&dest) {
                    continue;
                }
                open = Some(OpenLink {
                    dest: dest.to_string(),
                    range,
                    text: String::new(),
                });
            }
            Event::End(Tag::Link(..)) => {
                if let Some(done) = open.take() {
                    let (raw_path, anchor) = split_link_target(&done.dest);
                    let (line, column) = line_col(done.range.start, offsets);
                    let text = if done.text.is_empty() {
                        None
                    } else {
                        Some(done.text.clone())
                    };
                    links.push(build_link(
                        patterns,
                        source_absolute,
                        line_text(content, offsets, line),
                        LinkInput {
                            kind: LinkKind::Markdown,
                            raw_path,
                            anchor,
                            text,
                            full_match: content[done.range.clone()].to_string(),
                            line,
                            column,
                        },
                    ));
                }
            }
            Event::Text(value) | Event::Code(value) => {
                if let Some(open) = open.as_mut() {
                    open.text.push_str(&value);
                }
            }
            _ => {}
        }
    }

    links
}

/// Phase B: regex families for the Obsidian dialect, applied line by line
/// outside fenced code, each match guarded against double extraction by
/// `(line, column)` and against inline code spans.
pub(crate) fn collect_pattern_links(
    patterns: &LinkPatterns,
    content: &str,
    source_absolute: &Path,
    taken: &mut HashSet<(usize, usize)>,
) -> Vec<Link> {
    let mut links = Vec::new();
    let fenced = fenced_line_set(content);

    for (idx, line) in content.split('\n').enumerate() {
        let line_no = idx + 1;
        if fenced.contains(&line_no) {
            continue;
        }
        let line = line.trim_end_matches('\r');

        // Markdown links whose anchor the lexer rejected (spaces, colons,
        // balanced parens).
        for caps in patterns.md_anchor.captures_iter(line) {
            let whole = caps.get(0).expect("whole match");
            if guard(taken, line, line_no, whole.start()) {
                continue;
            }
            let link = build_link(
                patterns,
                source_absolute,
                line,
                LinkInput {
                    kind: LinkKind::Markdown,
                    raw_path: caps.get(2).expect("path").as_str(),
                    anchor: caps.get(3).map(|anchor| anchor.as_str()),
                    text: non_empty(caps.get(1).map(|text| text.as_str())),
                    full_match: whole.as_str().to_string(),
                    line: line_no,
                    column: whole.start(),
                },
            );
            taken.insert((link.line, link.column));
            links.push(link);
        }

        // Internal anchor links.
        for caps in patterns.md_internal.captures_iter(line) {
            let whole = caps.get(0).expect("whole match");
            if guard(taken, line, line_no, whole.start()) {
                continue;
            }
            let link = build_link(
                patterns,
                source_absolute,
                line,
                LinkInput {
                    kind: LinkKind::Markdown,
                    raw_path: "",
                    anchor: caps.get(2).map(|anchor| anchor.as_str()),
                    text: non_empty(caps.get(1).map(|text| text.as_str())),
                    full_match: whole.as_str().to_string(),
                    line: line_no,
                    column: whole.start(),
                },
            );
            taken.insert((link.line, link.column));
            links.push(link);
        }

        // Relative doc links without an extension.
        for caps in patterns.md_plain.captures_iter(line) {
            let whole = caps.get(0).expect("whole match");
            let path = caps.get(2).expect("path").as_str();
            if !path.contains('/') || is_markdown_path(path) || is_external(path) {
                continue;
            }
            if guard(taken, line, line_no, whole.start()) {
                continue;
            }
            let link = build_link(
                patterns,
                source_absolute,
                line,
                LinkInput {
                    kind: LinkKind::Markdown,
                    raw_path: path,
                    anchor: None,
                    text: non_empty(caps.get(1).map(|text| text.as_str())),
                    full_match: whole.as_str().to_string(),
                    line: line_no,
                    column: whole.start(),
                },
            );
            taken.insert((link.line, link.column));
            links.push(link);
        }

        // Citation form `[cite: path]`.
        for caps in patterns.citation.captures_iter(line) {
            let whole = caps.get(0).expect("whole match");
            if guard(taken, line, line_no, whole.start()) {
                continue;
            }
            let target = caps.get(1).expect("target").as_str().trim();
            let (raw_path, anchor) = split_link_target(target);
            let link = build_link(
                patterns,
                source_absolute,
                line,
                LinkInput {
                    kind: LinkKind::Markdown,
                    raw_path,
                    anchor,
                    text: None,
                    full_match: whole.as_str().to_string(),
                    line: line_no,
                    column: whole.start(),
                },
            );
            taken.insert((link.line, link.column));
            links.push(link);
        }

        // Wiki cross-document links.
        for caps in patterns.wiki_cross.captures_iter(line) {
            let whole = caps.get(0).expect("whole match");
            if guard(taken, line, line_no, whole.start()) {
                continue;
            }
            let raw_path = caps.get(1).expect("path").as_str();
            let anchor = caps.get(2).map(|anchor| anchor.as_str());
            let alias = caps.get(3).map(|alias| alias.as_str().to_string());
            let display = alias.unwrap_or_else(|| {
                anchor
                    .map(|anchor| format!("{raw_path}#{anchor}"))
                    .unwrap_or_else(|| raw_path.to_string())
            });
            let link = build_link(
                patterns,
                source_absolute,
                line,
                LinkInput {
                    kind: LinkKind::Wiki,
                    raw_path,
                    anchor,
                    text: Some(display),
                    full_match: whole.as_str().to_string(),
                    line: line_no,
                    column: whole.start(),
                },
            );
            taken.insert((link.line, link.column));
            links.push(link);
        }

        // Wiki internal links.
        for caps in patterns.wiki_internal.captures_iter(line) {
            let whole = caps.get(0).expect("whole match");
            if guard(taken, line, line_no, whole.start()) {
                continue;
            }
            let anchor = caps.get(1).expect("anchor").as_str();
            let alias = caps.get(2).map(|alias| alias.as_str().to_string());
            let link = build_link(
                patterns,
                source_absolute,
                line,
                LinkInput {
                    kind: LinkKind::Wiki,
                    raw_path: "",
                    anchor: Some(anchor),
                    text: alias.or_else(|| Some(format!("#{anchor}"))),
                    full_match: whole.as_str().to_string(),
                    line: line_no,
                    column: whole.start(),
                },
            );
            taken.insert((link.line, link.column));
            links.push(link);
        }

        // Standalone caret block references. Text is absent by contract.
        for caps in patterns.caret_ref.captures_iter(line) {
            let token = caps.get(1).expect("caret token");
            if is_semver_reference(line, token.end()) {
                continue;
            }
            if guard(taken, line, line_no, token.start()) {
                continue;
            }
            let link = build_link(
                patterns,
                source_absolute,
                line,
                LinkInput {
                    kind: LinkKind::Wiki,
                    raw_path: "",
                    anchor: Some(token.as_str()),
                    text: None,
                    full_match: token.as_str().to_string(),
                    line: line_no,
                    column: token.start(),
                },
            );
            taken.insert((link.line, link.column));
            links.push(link);
        }
    }

    links
}

/// Shared guard for every regex family: already extracted at this
/// position, or inside an inline code span.
fn guard(taken: &HashSet<(usize, usize)>, line: &str, line_no: usize, column: usize) -> bool {
    taken.contains(&(line_no, column)) || in_inline_code(line, column)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// A caret immediately followed by `.digit` is a version spec like
/// `^14.0.1`, never a block reference.
fn is_semver_reference(line: &str, token_end: usize) -> bool {
    let mut chars = line[token_end..].chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('.'), Some(digit)) if digit.is_ascii_digit()
    )
}
