//! Obsidian-flavored Markdown parsing for mdcite.
//!
//! The dialect sits outside CommonMark, so extraction combines a
//! standards-compliant lexer pass with guarded regex fallbacks; a single
//! factory constructs every link, a single normaliser strips
//! Obsidian-invalid characters, and a single cache parses each file once.

mod anchors;
mod code_spans;
mod document;
mod file_cache;
mod lines;
mod links;
mod model;
mod parse_cache;
mod parser;
mod paths;

pub use anchors::{kebab_case, normalize_obsidian_text, percent_decode, url_encoded_heading_id};
pub use document::ParsedDocument;
pub use file_cache::{FileCache, FileCacheStats, FileResolution, ResolveFailure};
pub use lines::{byte_to_line, compute_line_offsets, line_col, line_text};
pub use model::{
    Anchor, AnchorKind, ExtractionMarker, Heading, Link, LinkKind, LinkScope, PathConversion,
    SourceRef, TargetRef, Validation,
};
pub use parse_cache::ParsedFileCache;
pub use parser::{MarkdownParser, ParseError};
pub use paths::{
    is_external, is_markdown_path, normalize_path, path_to_slash, relative_path, resolve_from_dir,
    split_link_target,
};
