//! Output formatters for mdcite commands.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::json;

use mdcite_extract::ExtractedContent;
use mdcite_parser::{Link, Validation};
use mdcite_validator::{FindingStatus, ScanOutcome, ValidationSummary};

/// Data backing a validation report.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRenderData {
    pub source: PathBuf,
    pub summary: ValidationSummary,
    pub links: Vec<Link>,
}

/// Renders validation and extraction reports for humans and machines.
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    /// Human-facing validation report, one line per link plus a summary.
    pub fn render_validation_cli(&self, data: &ValidationRenderData) -> String {
        let mut out = String::new();
        for link in &data.links {
            let location = format!("{}:{}", data.source.display(), link.line);
            match &link.validation {
                Some(Validation::Valid) => {
                    let _ = writeln!(out, "✅ {location} {}", link.full_match);
                }
                Some(Validation::Warning {
                    error,
                    suggestion,
                    path_conversion,
                }) => {
                    let _ = writeln!(out, "⚠️  {location} {}", link.full_match);
                    if let Some(error) = error {
                        let _ = writeln!(out, "   {error}");
                    }
                    if let Some(suggestion) = suggestion {
                        let _ = writeln!(out, "   ↳ {suggestion}");
                    }
                    if let Some(conversion) = path_conversion {
                        let _ = writeln!(
                            out,
                            "   ↳ path: '{}' → '{}'",
                            conversion.original, conversion.recommended
                        );
                    }
                }
                Some(Validation::Error {
                    error,
                    suggestion,
                    path_conversion,
                }) => {
                    let _ = writeln!(out, "❌ {location} {}", link.full_match);
                    let _ = writeln!(out, "   {error}");
                    if let Some(suggestion) = suggestion {
                        let _ = writeln!(out, "   ↳ {suggestion}");
                    }
                    if let Some(conversion) = path_conversion {
                        let _ = writeln!(
                            out,
                            "   ↳ path: '{}' → '{}'",
                            conversion.original, conversion.recommended
                        );
                    }
                }
                None => {
                    let _ = writeln!(out, "•  {location} {} (not validated)", link.full_match);
                }
            }
        }

        let summary = &data.summary;
        let _ = write!(
            out,
            "{} links: {} valid, {} warnings, {} errors",
            summary.total, summary.valid, summary.warnings, summary.errors
        );
        out
    }

    /// Machine-readable validation report.
    pub fn render_validation_json(
        &self,
        data: &ValidationRenderData,
    ) -> serde_json::Result<String> {
        let payload = json!({
            "source": data.source,
            "summary": data.summary,
            "links": data.links,
        });
        serde_json::to_string_pretty(&payload)
    }

    /// Wire-format extraction report; block order is first-seen and the
    /// blocks object leads with `_totalContentCharacterLength`.
    pub fn render_extraction_json(&self, content: &ExtractedContent) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&content.to_json()?)
    }

    /// Human-facing scan report: one line per finding plus totals.
    pub fn render_scan_cli(&self, outcome: &ScanOutcome) -> String {
        let mut out = String::new();
        for finding in &outcome.findings {
            let icon = match finding.status {
                FindingStatus::Warning => "⚠️ ",
                FindingStatus::Error => "❌",
            };
            let _ = writeln!(
                out,
                "{icon} {}:{} {}",
                finding.path.display(),
                finding.line,
                finding.message
            );
            if let Some(suggestion) = &finding.suggestion {
                let _ = writeln!(out, "   ↳ {suggestion}");
            }
        }
        let summary = &outcome.summary;
        let _ = write!(
            out,
            "{} files, {} links: {} valid, {} warnings, {} errors",
            outcome.files_scanned, summary.total, summary.valid, summary.warnings, summary.errors
        );
        out
    }

    /// Machine-readable scan report.
    pub fn render_scan_json(&self, outcome: &ScanOutcome) -> serde_json::Result<String> {
        serde_json::to_string_pretty(outcome)
    }

    /// SARIF 2.1.0 rendering of a scan, for code-quality integrations.
    pub fn render_scan_sarif(&self, outcome: &ScanOutcome) -> serde_json::Result<String> {
        let results: Vec<serde_json::Value> = outcome
            .findings
            .iter()
            .map(|finding| {
                let level = match finding.status {
                    FindingStatus::Warning => "warning",
                    FindingStatus::Error => "error",
                };
                json!({
                    "ruleId": "citation-validity",
                    "level": level,
                    "message": { "text": finding.message },
                    "locations": [{
                        "physicalLocation": {
                            "artifactLocation": { "uri": finding.path.to_string_lossy() },
                            "region": {
                                "startLine": finding.line.max(1),
                                "startColumn": finding.column + 1,
                            }
                        }
                    }]
                })
            })
            .collect();

        let payload = json!({
            "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
            "version": "2.1.0",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": "mdcite",
                        "informationUri": "https://github.com/mdcite/mdcite",
                        "rules": [{
                            "id": "citation-validity",
                            "shortDescription": { "text": "Citation link resolves to an existing file and anchor" }
                        }]
                    }
                },
                "results": results,
            }]
        });
        serde_json::to_string_pretty(&payload)
    }

    /// Short human summary after an extract run.
    pub fn render_extraction_cli(&self, content: &ExtractedContent) -> String {
        let stats = &content.stats;
        format!(
            "{} links: {} unique blocks, {} duplicates, {} chars saved (ratio {:.2})",
            stats.total_links,
            stats.unique_content,
            stats.duplicate_content_detected,
            stats.tokens_saved,
            stats.compression_ratio
        )
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer::new()
    }
}
