//! Scope-wide validation: every indexed file, aggregated findings.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use mdcite_parser::Validation;

use crate::{CitationValidator, ValidationSummary, ValidatorError};

/// One reportable problem discovered during a scan.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFinding {
    /// Path relative to the scanned scope where possible.
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub status: FindingStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    Warning,
    Error,
}

/// Aggregate result of validating a whole scope.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub files_scanned: usize,
    pub summary: ValidationSummary,
    pub findings: Vec<ScanFinding>,
}

impl CitationValidator {
    /// Validate every file in `targets` (absolute paths), folding each
    /// link verdict into one finding list sorted by path and position.
    /// An unreadable file becomes an error finding rather than aborting
    /// the scan.
    pub fn validate_scope(
        &self,
        targets: &[PathBuf],
        scope_root: &Path,
    ) -> Result<ScanOutcome, ValidatorError> {
        let per_file: Vec<(ValidationSummary, Vec<ScanFinding>)> = targets
            .par_iter()
            .map(|path| self.scan_one(path, scope_root))
            .collect();

        let mut summary = ValidationSummary::default();
        let mut findings = Vec::new();
        for (file_summary, mut file_findings) in per_file {
            summary.total += file_summary.total;
            summary.valid += file_summary.valid;
            summary.warnings += file_summary.warnings;
            summary.errors += file_summary.errors;
            findings.append(&mut file_findings);
        }

        findings.sort_by(|a, b| {
            (&a.path, a.line, a.column).cmp(&(&b.path, b.line, b.column))
        });

        debug!(
            files = targets.len(),
            links = summary.total,
            errors = summary.errors,
            "scope scan settled"
        );
        Ok(ScanOutcome {
            files_scanned: targets.len(),
            summary,
            findings,
        })
    }

    fn scan_one(&self, path: &Path, scope_root: &Path) -> (ValidationSummary, Vec<ScanFinding>) {
        let display = path
            .strip_prefix(scope_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf());

        let result = match self.validate_file(path) {
            Ok(result) => result,
            Err(err) => {
                let finding = ScanFinding {
                    path: display,
                    line: 0,
                    column: 0,
                    status: FindingStatus::Error,
                    message: format!("failed to read file: {err}"),
                    suggestion: None,
                };
                return (
                    ValidationSummary {
                        total: 0,
                        valid: 0,
                        warnings: 0,
                        errors: 1,
                    },
                    vec![finding],
                );
            }
        };

        let findings = result
            .links
            .iter()
            .filter_map(|link| {
                let (status, message, suggestion) = match link.validation.as_ref()? {
                    Validation::Valid => return None,
                    Validation::Warning {
                        error, suggestion, ..
                    } => (
                        FindingStatus::Warning,
                        error
                            .clone()
                            .unwrap_or_else(|| format!("'{}' needs attention", link.full_match)),
                        suggestion.clone(),
                    ),
                    Validation::Error {
                        error, suggestion, ..
                    } => (FindingStatus::Error, error.clone(), suggestion.clone()),
                };
                Some(ScanFinding {
                    path: display.clone(),
                    line: link.line,
                    column: link.column,
                    status,
                    message,
                    suggestion,
                })
            })
            .collect();

        (result.summary, findings)
    }
}
