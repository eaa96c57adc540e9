//! Citation validation: pattern classification, target resolution, anchor
//! verification, and in-place enrichment of parsed links.

mod resolve;
mod scan;
mod verify;

pub use scan::{FindingStatus, ScanFinding, ScanOutcome};

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use mdcite_parser::{
    is_markdown_path, normalize_path, path_to_slash, percent_decode, relative_path,
    resolve_from_dir, AnchorKind, FileCache, Link, LinkScope, ParseError, ParsedFileCache,
    PathConversion, Validation,
};

use crate::resolve::{resolve_target, vault_absolute_pattern, ResolvedTarget};
use crate::verify::AnchorCheck;

/// Per-file validation counts, computed after every link settles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total: usize,
    pub valid: usize,
    pub warnings: usize,
    pub errors: usize,
}

/// Result of validating one source file. `links` is the parser's own
/// link sequence, enriched in place; no wrapper types are introduced.
#[derive(Clone, Debug)]
pub struct FileValidation {
    pub summary: ValidationSummary,
    pub links: Vec<Link>,
}

/// Errors that abort a validation run (per-link failures never do).
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error(transparent)]
    Source(#[from] ParseError),
}

/// Classifies, resolves, and verifies every link of a source document.
pub struct CitationValidator {
    parsed_files: Arc<ParsedFileCache>,
    file_cache: Arc<FileCache>,
    pub(crate) patterns: CitationPatterns,
}

/// Compiled shapes used during classification and verification.
pub(crate) struct CitationPatterns {
    pub caret_allowlist: Regex,
    pub emphasis: Regex,
    pub vault_absolute: Regex,
    pub link_decoration: Regex,
}

impl CitationPatterns {
    fn new() -> Self {
        CitationPatterns {
            // Requirement/AC/task numbering plus kebab-case block names.
            caret_allowlist: Regex::new(
                r"^(FR\d+(-\d+)?|NFR\d+(-\d+)?|AC\d+(-\d+)?|US\d+(-\d+[a-z]?)?(T\d+(-\d+)?)?|MVP-P\d+|[a-z][a-z0-9]*(-[a-z0-9]+)*)$",
            )
            .expect("caret allowlist"),
            emphasis: Regex::new(r"^==\*\*[^*]+\*\*==$").expect("emphasis shape"),
            vault_absolute: vault_absolute_pattern(),
            link_decoration: Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("link decoration"),
        }
    }
}

/// Link shapes the validator understands, in precedence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CitationPattern {
    CaretSyntax,
    EmphasisMarked,
    CrossDocument,
    WikiInternal,
    Unknown,
}

/// Factory mirroring the test seam: substitute caches, real or
/// test-double, without touching module state.
pub fn create_citation_validator(
    parsed_files: Arc<ParsedFileCache>,
    file_cache: Arc<FileCache>,
) -> CitationValidator {
    CitationValidator::new(parsed_files, file_cache)
}

impl CitationValidator {
    pub fn new(parsed_files: Arc<ParsedFileCache>, file_cache: Arc<FileCache>) -> Self {
        CitationValidator {
            parsed_files,
            file_cache,
            patterns: CitationPatterns::new(),
        }
    }

    /// Validate every link of `path` in parallel and return the enriched
    /// links with a summary. Fails fast only when the source itself is
    /// unreadable.
    pub fn validate_file(&self, path: &Path) -> Result<FileValidation, ValidatorError> {
        let absolute = normalize_path(path.to_path_buf());
        let document = self.parsed_files.resolve(&absolute)?;

        let mut links: Vec<Link> = document.links().to_vec();
        links
            .par_iter_mut()
            .for_each(|link| self.validate_single(link));

        let summary = summarize(&links);
        debug!(
            path = %absolute.display(),
            total = summary.total,
            errors = summary.errors,
            "validated file"
        );
        Ok(FileValidation { summary, links })
    }

    /// Validate one link, attaching its verdict in place.
    pub fn validate_single(&self, link: &mut Link) {
        let verdict = match self.classify(link) {
            CitationPattern::CaretSyntax => self.validate_caret(link),
            CitationPattern::WikiInternal => self.validate_internal(link),
            CitationPattern::EmphasisMarked | CitationPattern::CrossDocument => {
                self.validate_cross_document(link)
            }
            CitationPattern::Unknown => Validation::Error {
                error: format!(
                    "Unrecognised citation shape: '{}'",
                    link.full_match
                ),
                suggestion: Some(
                    "Expected a markdown link to a .md file, a wiki link, an internal \
                     #anchor link, or a ^block reference"
                        .to_string(),
                ),
                path_conversion: None,
            },
        };
        link.validation = Some(verdict);
    }

    fn classify(&self, link: &Link) -> CitationPattern {
        match link.scope {
            LinkScope::Internal => match link.anchor_type {
                Some(AnchorKind::Block) => CitationPattern::CaretSyntax,
                Some(AnchorKind::Header) => CitationPattern::WikiInternal,
                None => CitationPattern::Unknown,
            },
            LinkScope::CrossDocument => {
                let anchor_is_emphasis = link
                    .target
                    .anchor
                    .as_deref()
                    .map(|anchor| self.patterns.emphasis.is_match(&percent_decode(anchor)))
                    .unwrap_or(false);
                if anchor_is_emphasis {
                    CitationPattern::EmphasisMarked
                } else if is_markdown_path(&link.target.raw)
                    || Path::new(&link.target.raw).extension().is_none()
                {
                    CitationPattern::CrossDocument
                } else {
                    CitationPattern::Unknown
                }
            }
        }
    }

    fn validate_caret(&self, link: &Link) -> Validation {
        let anchor = link.target.anchor.as_deref().unwrap_or_default();
        let id = anchor.trim_start_matches('^');

        if !self.patterns.caret_allowlist.is_match(id) {
            return Validation::Error {
                error: format!("Block reference '^{id}' does not match any allowed block shape"),
                suggestion: Some(
                    "Allowed shapes: requirement ids (^FR1, ^NFR2), story/task ids \
                     (^US1-4bT1-1), milestones (^MVP-P1), or kebab-case block names"
                        .to_string(),
                ),
                path_conversion: None,
            };
        }

        self.verify_in_document(&link.source.absolute, anchor, false, None)
    }

    fn validate_internal(&self, link: &Link) -> Validation {
        let anchor = link.target.anchor.as_deref().unwrap_or_default();
        self.verify_in_document(&link.source.absolute, anchor, false, None)
    }

    fn validate_cross_document(&self, link: &mut Link) -> Validation {
        let resolved = match resolve_target(
            &link.target.raw,
            &link.source.absolute,
            &self.file_cache,
            &self.patterns.vault_absolute,
        ) {
            Ok(resolved) => resolved,
            Err(failure) => {
                return Validation::Error {
                    error: failure.message,
                    suggestion: failure.suggestion,
                    path_conversion: None,
                };
            }
        };

        let source_dir = link
            .source
            .absolute
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let written = resolve_from_dir(source_dir, &percent_decode(&link.target.raw));
        let cross_directory = resolved.absolute.parent() != written.parent();

        let conversion = if cross_directory {
            relative_path(source_dir, &resolved.absolute).map(|relative| {
                PathConversion::new(link.target.raw.clone(), path_to_slash(&relative))
            })
        } else {
            None
        };

        // Enrichment fixes the resolved location so extraction reads the
        // discovered file, not the literal path.
        link.target.absolute = Some(resolved.absolute.clone());
        link.target.relative = relative_path(source_dir, &resolved.absolute);

        let anchor = link.target.anchor.clone();
        match anchor {
            None => {
                if cross_directory {
                    Validation::Warning {
                        error: None,
                        suggestion: resolution_note(&resolved),
                        path_conversion: conversion,
                    }
                } else if resolved.fuzzy {
                    Validation::Warning {
                        error: None,
                        suggestion: resolution_note(&resolved),
                        path_conversion: None,
                    }
                } else {
                    Validation::Valid
                }
            }
            Some(anchor) => {
                self.verify_in_document(&resolved.absolute, &anchor, cross_directory, conversion)
            }
        }
    }

    /// Resolve `document_path` through the shared cache and grade the
    /// anchor against it, applying the cross-directory severity policy.
    fn verify_in_document(
        &self,
        document_path: &Path,
        anchor: &str,
        cross_directory: bool,
        conversion: Option<PathConversion>,
    ) -> Validation {
        let document = match self.parsed_files.resolve(document_path) {
            Ok(document) => document,
            Err(err) => {
                return Validation::Error {
                    error: format!("Unable to read target file: {err}"),
                    suggestion: None,
                    path_conversion: conversion,
                };
            }
        };

        match self.check_anchor(&document, anchor) {
            AnchorCheck::Found => {
                if cross_directory {
                    Validation::Warning {
                        error: None,
                        suggestion: Some(format!(
                            "Target resolved outside the written directory; prefer '{}'",
                            conversion
                                .as_ref()
                                .map(|c| c.recommended.clone())
                                .unwrap_or_default()
                        )),
                        path_conversion: conversion,
                    }
                } else {
                    Validation::Valid
                }
            }
            AnchorCheck::KebabBetter { encoded } => Validation::Warning {
                error: Some(format!(
                    "Anchor '#{anchor}' uses a kebab-case form of the heading"
                )),
                suggestion: Some(format!(
                    "Use the heading text URL-encoded for Obsidian compatibility: '#{encoded}'"
                )),
                path_conversion: conversion,
            },
            AnchorCheck::Missing { suggestion } => {
                let error = format!(
                    "Anchor '#{anchor}' not found in {}",
                    document.file_path().display()
                );
                if cross_directory {
                    Validation::Warning {
                        error: Some(error),
                        suggestion,
                        path_conversion: conversion,
                    }
                } else {
                    Validation::Error {
                        error,
                        suggestion,
                        path_conversion: conversion,
                    }
                }
            }
        }
    }
}

fn resolution_note(resolved: &ResolvedTarget) -> Option<String> {
    match (&resolved.note, &resolved.corrected) {
        (Some(note), _) => Some(note.clone()),
        (None, Some(corrected)) => Some(format!("resolved by filename to '{corrected}'")),
        (None, None) => None,
    }
}

fn summarize(links: &[Link]) -> ValidationSummary {
    let mut summary = ValidationSummary {
        total: links.len(),
        ..ValidationSummary::default()
    };
    for link in links {
        match &link.validation {
            Some(Validation::Valid) => summary.valid += 1,
            Some(Validation::Warning { .. }) => summary.warnings += 1,
            Some(Validation::Error { .. }) => summary.errors += 1,
            None => {}
        }
    }
    summary
}
