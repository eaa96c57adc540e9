//! Document model shared by the parser, validator, and extractor.
//!
//! All entities are immutable after parsing except [`Link::validation`],
//! which the validator attaches in place exactly once per validation run.

use std::path::PathBuf;

use serde::Serialize;

/// Syntax family a link was written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Markdown,
    Wiki,
}

/// Whether a link stays within its own document or crosses into another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LinkScope {
    #[serde(rename = "internal")]
    Internal,
    #[serde(rename = "cross-document")]
    CrossDocument,
}

/// Kind of fragment a link or anchor addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    Header,
    Block,
}

/// Origin of a link: the file it was extracted from.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub absolute: PathBuf,
}

/// Destination of a link in raw and resolved forms.
///
/// `absolute` is `None` exactly when the link is internal; `anchor` keeps
/// the fragment as written (URL encoding and caret prefix untouched).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub raw: String,
    pub absolute: Option<PathBuf>,
    pub relative: Option<PathBuf>,
    pub anchor: Option<String>,
}

/// `%%…%%` or `<!-- … -->` comment trailing a link.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMarker {
    pub full_match: String,
    pub inner_text: String,
}

/// Path rewrite offered when a target resolved through a different
/// directory than the written path implies.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathConversion {
    #[serde(rename = "type")]
    kind: &'static str,
    pub original: String,
    pub recommended: String,
}

impl PathConversion {
    pub fn new(original: impl Into<String>, recommended: impl Into<String>) -> Self {
        PathConversion {
            kind: "path-conversion",
            original: original.into(),
            recommended: recommended.into(),
        }
    }
}

/// Validation verdict attached to a link, keyed by status.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Validation {
    Valid,
    Warning {
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
        #[serde(rename = "pathConversion", skip_serializing_if = "Option::is_none")]
        path_conversion: Option<PathConversion>,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
        #[serde(rename = "pathConversion", skip_serializing_if = "Option::is_none")]
        path_conversion: Option<PathConversion>,
    },
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Validation::Warning { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Validation::Error { .. })
    }

    /// Human message carried by the verdict, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Validation::Valid => None,
            Validation::Warning { error, .. } => error.as_deref(),
            Validation::Error { error, .. } => Some(error),
        }
    }

    pub fn path_conversion(&self) -> Option<&PathConversion> {
        match self {
            Validation::Valid => None,
            Validation::Warning {
                path_conversion, ..
            }
            | Validation::Error {
                path_conversion, ..
            } => path_conversion.as_ref(),
        }
    }
}

/// One outgoing reference discovered in a source document.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub link_type: LinkKind,
    pub scope: LinkScope,
    pub anchor_type: Option<AnchorKind>,
    pub source: SourceRef,
    pub target: TargetRef,
    pub text: Option<String>,
    pub full_match: String,
    /// 1-indexed line of the match within the source document.
    pub line: usize,
    /// 0-indexed byte column of the match within its line.
    pub column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_marker: Option<ExtractionMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

impl Link {
    pub fn is_internal(&self) -> bool {
        self.scope == LinkScope::Internal
    }

    pub fn is_cross_document(&self) -> bool {
        self.scope == LinkScope::CrossDocument
    }

    /// Marker instruction trailing the link, if one was written.
    pub fn marker_text(&self) -> Option<&str> {
        self.extraction_marker
            .as_ref()
            .map(|marker| marker.inner_text.as_str())
    }
}

/// Addressable fragment declared inside a document.
///
/// Every heading yields exactly one header anchor carrying both the raw
/// id and its Obsidian URL-encoded form; block anchors carry the id only.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    #[serde(rename = "anchorType")]
    pub kind: AnchorKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_encoded_id: Option<String>,
    pub raw_text: String,
    pub full_match: String,
    pub line: usize,
    pub column: usize,
}

/// Heading recorded during lexing; the source of truth for header anchors.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Heading {
    /// Heading depth, 1–6.
    pub level: u32,
    /// Inner text with any trailing `{#custom-id}` removed.
    pub text: String,
    /// Source line as written.
    pub raw: String,
    pub line: usize,
}
