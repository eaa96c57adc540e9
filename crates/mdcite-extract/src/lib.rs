//! Content extraction: eligibility, retrieval, and SHA-based dedup.

mod strategy;

pub use strategy::{
    default_chain, BlockLinkStrategy, Decision, EligibilityStrategy, ExtractFlags,
    ForceMarkerStrategy, FullFileStrategy, SectionLinkStrategy, SuppressMarkerStrategy,
};

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use mdcite_parser::{
    normalize_obsidian_text, percent_decode, AnchorKind, Link, ParsedDocument, ParsedFileCache,
};

/// One occurrence of a link whose content landed in a block.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLinkRef {
    pub raw_source_link: String,
    pub source_line: usize,
}

/// Deduplicated content keyed by its id in the output contract.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub content: String,
    pub content_length: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_links: Vec<SourceLinkRef>,
}

/// Block plus its content id, kept in first-seen order.
#[derive(Clone, Debug)]
pub struct ContentEntry {
    pub id: String,
    pub block: ContentBlock,
}

/// Terminal state of one processed link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Extracted,
    Skipped,
    Failed,
}

/// Report entry for one link, in enriched-link order.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedLink {
    pub source_link: Link,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_details: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingLinksReport {
    pub processed_links: Vec<ProcessedLink>,
}

/// Aggregate counters; `total_links` always equals
/// `unique_content + duplicate_content_detected + skipped + failed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStats {
    pub total_links: usize,
    pub unique_content: usize,
    pub duplicate_content_detected: usize,
    pub tokens_saved: usize,
    pub compression_ratio: f64,
}

/// The extractor output contract.
#[derive(Clone, Debug)]
pub struct ExtractedContent {
    /// JSON-stringified size of the blocks object.
    pub total_content_character_length: usize,
    pub entries: Vec<ContentEntry>,
    pub report: OutgoingLinksReport,
    pub stats: ExtractionStats,
}

impl ExtractedContent {
    pub fn block(&self, id: &str) -> Option<&ContentBlock> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.block)
    }

    /// Render the wire shape: blocks keyed by content id, led by
    /// `_totalContentCharacterLength`, plus report and stats.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        let mut blocks = serde_json::Map::new();
        blocks.insert(
            "_totalContentCharacterLength".to_string(),
            json!(self.total_content_character_length),
        );
        for entry in &self.entries {
            blocks.insert(entry.id.clone(), serde_json::to_value(&entry.block)?);
        }
        Ok(json!({
            "extractedContentBlocks": blocks,
            "outgoingLinksReport": serde_json::to_value(&self.report)?,
            "stats": serde_json::to_value(&self.stats)?,
        }))
    }
}

/// Walks enriched links through the strategy chain, retrieves content
/// through the shared parse cache, and deduplicates by content hash.
pub struct ContentExtractor {
    parsed_files: Arc<ParsedFileCache>,
    strategies: Vec<Box<dyn EligibilityStrategy>>,
}

impl ContentExtractor {
    pub fn new(parsed_files: Arc<ParsedFileCache>) -> Self {
        ContentExtractor {
            parsed_files,
            strategies: default_chain(),
        }
    }

    /// Substitute a custom strategy chain; order is precedence.
    pub fn with_strategies(
        parsed_files: Arc<ParsedFileCache>,
        strategies: Vec<Box<dyn EligibilityStrategy>>,
    ) -> Self {
        ContentExtractor {
            parsed_files,
            strategies,
        }
    }

    /// Process links in order. Internal links are dropped outright; every
    /// other link ends as exactly one extracted, skipped, or failed
    /// entry. Per-link failures never abort the batch.
    pub fn extract_content(&self, links: &[Link], flags: &ExtractFlags) -> ExtractedContent {
        let mut entries: Vec<ContentEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut processed: Vec<ProcessedLink> = Vec::new();

        let mut total_links = 0usize;
        let mut duplicates = 0usize;
        let mut tokens_saved = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;

        for link in links {
            if link.is_internal() {
                continue;
            }
            total_links += 1;

            if let Some(validation) = &link.validation {
                if validation.is_error() {
                    skipped += 1;
                    processed.push(ProcessedLink {
                        source_link: link.clone(),
                        content_id: None,
                        status: ProcessStatus::Skipped,
                        eligibility_reason: Some(format!(
                            "Link failed validation: {}",
                            validation.error_message().unwrap_or("unknown error")
                        )),
                        failure_details: None,
                    });
                    continue;
                }
            }

            let decision = self.decide(link, flags);
            let Some(decision) = decision else {
                skipped += 1;
                processed.push(ProcessedLink {
                    source_link: link.clone(),
                    content_id: None,
                    status: ProcessStatus::Skipped,
                    eligibility_reason: Some("no strategy claimed the link".to_string()),
                    failure_details: None,
                });
                continue;
            };
            if !decision.eligible {
                skipped += 1;
                processed.push(ProcessedLink {
                    source_link: link.clone(),
                    content_id: None,
                    status: ProcessStatus::Skipped,
                    eligibility_reason: Some(decision.reason),
                    failure_details: None,
                });
                continue;
            }

            match self.retrieve(link) {
                Err(reason) => {
                    failed += 1;
                    processed.push(ProcessedLink {
                        source_link: link.clone(),
                        content_id: None,
                        status: ProcessStatus::Failed,
                        eligibility_reason: None,
                        failure_details: Some(reason),
                    });
                }
                Ok(content) => {
                    let id = content_id(&content);
                    let occurrence = SourceLinkRef {
                        raw_source_link: link.full_match.clone(),
                        source_line: link.line,
                    };
                    match index.get(&id) {
                        Some(&slot) => {
                            duplicates += 1;
                            tokens_saved += entries[slot].block.content_length;
                            entries[slot].block.source_links.push(occurrence);
                        }
                        None => {
                            index.insert(id.clone(), entries.len());
                            entries.push(ContentEntry {
                                id: id.clone(),
                                block: ContentBlock {
                                    content_length: content.len(),
                                    content,
                                    source_links: vec![occurrence],
                                },
                            });
                        }
                    }
                    processed.push(ProcessedLink {
                        source_link: link.clone(),
                        content_id: Some(id),
                        status: ProcessStatus::Extracted,
                        eligibility_reason: None,
                        failure_details: None,
                    });
                }
            }
        }

        let unique_bytes: usize = entries
            .iter()
            .map(|entry| entry.block.content_length)
            .sum();
        let compression_ratio = if unique_bytes + tokens_saved > 0 {
            tokens_saved as f64 / (unique_bytes + tokens_saved) as f64
        } else {
            0.0
        };

        let stats = ExtractionStats {
            total_links,
            unique_content: entries.len(),
            duplicate_content_detected: duplicates,
            tokens_saved,
            compression_ratio,
        };
        debug!(
            total = total_links,
            unique = stats.unique_content,
            duplicates,
            skipped,
            failed,
            "extraction settled"
        );

        ExtractedContent {
            total_content_character_length: stringified_blocks_length(&entries),
            entries,
            report: OutgoingLinksReport {
                processed_links: processed,
            },
            stats,
        }
    }

    fn decide(&self, link: &Link, flags: &ExtractFlags) -> Option<Decision> {
        for strategy in &self.strategies {
            if let Some(decision) = strategy.evaluate(link, flags) {
                return Some(decision);
            }
        }
        None
    }

    fn retrieve(&self, link: &Link) -> Result<String, String> {
        let absolute = link
            .target
            .absolute
            .as_ref()
            .ok_or_else(|| "missing resolved target path".to_string())?;
        let document = self
            .parsed_files
            .resolve(absolute)
            .map_err(|err| format!("Unable to read target file: {err}"))?;

        match link.anchor_type {
            Some(AnchorKind::Header) => {
                let anchor = link.target.anchor.as_deref().unwrap_or_default();
                let decoded = percent_decode(anchor);
                let level = heading_level_for(&document, &decoded);
                document
                    .extract_section(&decoded, level)
                    .ok_or_else(|| format!("Heading not found: '{decoded}'"))
            }
            Some(AnchorKind::Block) => {
                let anchor = link.target.anchor.as_deref().unwrap_or_default();
                let id = anchor.trim_start_matches('^');
                document
                    .extract_block(id)
                    .ok_or_else(|| format!("Block not found: '^{id}'"))
            }
            None => Ok(document.extract_full_content().to_string()),
        }
    }
}

/// First 16 hex characters of the SHA-256 of the content; equal ids
/// imply byte-equal content.
pub fn content_id(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(16);
    id
}

fn heading_level_for(document: &ParsedDocument, decoded: &str) -> Option<u32> {
    let wanted = normalize_obsidian_text(decoded);
    document
        .headings()
        .iter()
        .find(|heading| {
            heading.text == decoded || normalize_obsidian_text(&heading.text) == wanted
        })
        .map(|heading| heading.level)
}

fn stringified_blocks_length(entries: &[ContentEntry]) -> usize {
    let mut blocks = serde_json::Map::new();
    for entry in entries {
        if let Ok(value) = serde_json::to_value(&entry.block) {
            blocks.insert(entry.id.clone(), value);
        }
    }
    serde_json::to_string(&serde_json::Value::Object(blocks))
        .map(|rendered| rendered.len())
        .unwrap_or(0)
}
