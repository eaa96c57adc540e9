use std::sync::Arc;

use mdcite_extract::{content_id, ContentExtractor, ExtractFlags, ProcessStatus};
use mdcite_parser::{FileCache, Link, ParsedFileCache};
use mdcite_test_support::Corpus;
use mdcite_validator::create_citation_validator;
use pretty_assertions::assert_eq;

/// Validate the source and hand back the enriched links plus the shared
/// parse cache, mirroring the production wiring.
fn enriched_links(corpus: &Corpus, source: &std::path::Path) -> (Vec<Link>, Arc<ParsedFileCache>) {
    let parsed_files = Arc::new(ParsedFileCache::new());
    let file_cache = FileCache::build(corpus.root(), None).expect("build file cache");
    let validator = create_citation_validator(Arc::clone(&parsed_files), Arc::new(file_cache));
    let result = validator.validate_file(source).expect("validate");
    (result.links, parsed_files)
}

#[test]
fn header_section_extraction_end_to_end() {
    let corpus = Corpus::new();
    let source = corpus.write("a.md", "[Intro](./b.md#Introduction)\n");
    corpus.write("b.md", "## Introduction\n\nbody\n\n## Next\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    assert_eq!(output.stats.total_links, 1);
    assert_eq!(output.stats.unique_content, 1);
    assert_eq!(output.stats.duplicate_content_detected, 0);
    assert_eq!(output.entries.len(), 1);
    assert_eq!(output.entries[0].block.content, "## Introduction\n\nbody\n");
}

#[test]
fn duplicate_sections_share_one_block() {
    let corpus = Corpus::new();
    let source = corpus.write(
        "a.md",
        "[one](./b.md#Intro)\n[two](./b.md#Intro)\n[three](./b.md#Intro)\n",
    );
    corpus.write("b.md", "## Intro\n\nshared body\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    assert_eq!(output.stats.total_links, 3);
    assert_eq!(output.stats.unique_content, 1);
    assert_eq!(output.stats.duplicate_content_detected, 2);
    assert_eq!(output.entries.len(), 1);
    assert_eq!(output.entries[0].block.source_links.len(), 3);
    assert_eq!(
        output.stats.tokens_saved,
        output.entries[0].block.content_length * 2
    );
    assert!(output.stats.compression_ratio > 0.0);
}

#[test]
fn content_ids_are_prefixes_of_the_content_hash() {
    let corpus = Corpus::new();
    let source = corpus.write("a.md", "[Intro](./b.md#Intro)\n");
    corpus.write("b.md", "## Intro\n\nbody\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    for entry in &output.entries {
        assert_eq!(entry.id.len(), 16);
        assert_eq!(entry.id, content_id(&entry.block.content));
    }
}

#[test]
fn syntactically_different_links_to_same_content_share_an_id() {
    let corpus = Corpus::new();
    let source = corpus.write(
        "a.md",
        "[markdown](./b.md#Intro)\n[[b.md#Intro|wiki]]\n",
    );
    corpus.write("b.md", "## Intro\n\nsame body\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    assert_eq!(output.stats.unique_content, 1);
    assert_eq!(output.stats.duplicate_content_detected, 1);
    assert_eq!(output.entries[0].block.source_links.len(), 2);
}

#[test]
fn citation_and_markdown_forms_share_content_ids() {
    let corpus = Corpus::new();
    let source = corpus.write("a.md", "[text](./b.md) %%force-extract%%\n[cite: b.md] %%force-extract%%\n");
    corpus.write("b.md", "# B\n\nwhole file\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    assert_eq!(output.stats.total_links, 2);
    assert_eq!(output.stats.unique_content, 1);
    assert_eq!(output.stats.duplicate_content_detected, 1);
    let ids: Vec<_> = output
        .report
        .processed_links
        .iter()
        .map(|entry| entry.content_id.clone())
        .collect();
    assert_eq!(ids[0], ids[1]);
}

#[test]
fn no_extract_marker_suppresses_an_eligible_section() {
    let corpus = Corpus::new();
    let source = corpus.write("a.md", "[X](./b.md#Intro) %%no-extract%%\n");
    corpus.write("b.md", "## Intro\n\nbody\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    assert_eq!(output.stats.unique_content, 0);
    assert_eq!(output.report.processed_links[0].status, ProcessStatus::Skipped);
    assert_eq!(
        output.report.processed_links[0].eligibility_reason.as_deref(),
        Some("no-extract marker")
    );
}

#[test]
fn block_reference_extracts_its_paragraph() {
    let corpus = Corpus::new();
    let source = corpus.write("a.md", "[detail](./b.md#^detail-ref)\n");
    corpus.write(
        "b.md",
        "intro\n\nThe tracked detail paragraph. ^detail-ref\n\nafter\n",
    );

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    assert_eq!(output.stats.unique_content, 1);
    assert_eq!(
        output.entries[0].block.content,
        "The tracked detail paragraph."
    );
}

#[test]
fn full_file_links_are_gated_by_flag() {
    let corpus = Corpus::new();
    let source = corpus.write("a.md", "[whole](./b.md)\n");
    corpus.write("b.md", "# B\n\neverything\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);

    let gated = ContentExtractor::new(Arc::clone(&parsed_files))
        .extract_content(&links, &ExtractFlags { full_files: false });
    assert_eq!(gated.stats.unique_content, 0);
    assert_eq!(gated.report.processed_links[0].status, ProcessStatus::Skipped);
    assert!(gated.report.processed_links[0]
        .eligibility_reason
        .as_deref()
        .expect("reason")
        .contains("--full-files"));

    let allowed = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags { full_files: true });
    assert_eq!(allowed.stats.unique_content, 1);
    assert_eq!(allowed.entries[0].block.content, "# B\n\neverything\n");
}

#[test]
fn force_marker_overrides_the_full_file_gate() {
    let corpus = Corpus::new();
    let source = corpus.write("a.md", "[whole](./b.md) %%force-extract%%\n");
    corpus.write("b.md", "# B\n\nbody\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags { full_files: false });

    assert_eq!(output.stats.unique_content, 1);
}

#[test]
fn invalid_links_are_skipped_with_the_validation_reason() {
    let corpus = Corpus::new();
    let source = corpus.write("a.md", "[bad](./ghost.md#Intro)\n[ok](./b.md#Intro)\n");
    corpus.write("b.md", "## Intro\n\nbody\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    assert_eq!(output.stats.total_links, 2);
    assert_eq!(output.stats.unique_content, 1);
    let skipped = &output.report.processed_links[0];
    assert_eq!(skipped.status, ProcessStatus::Skipped);
    assert!(skipped
        .eligibility_reason
        .as_deref()
        .expect("reason")
        .starts_with("Link failed validation:"));
}

#[test]
fn missing_heading_fails_only_that_link() {
    let corpus = Corpus::new();
    // Bypass validation so retrieval itself reports the miss.
    let source = corpus.write("a.md", "[gone](./b.md#Vanished)\n[ok](./b.md#Intro)\n");
    corpus.write("b.md", "## Intro\n\nbody\n");

    let parsed_files = Arc::new(ParsedFileCache::new());
    let links: Vec<Link> = parsed_files
        .resolve(&source)
        .expect("parse source")
        .links()
        .to_vec();

    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    assert_eq!(output.report.processed_links[0].status, ProcessStatus::Failed);
    assert!(output.report.processed_links[0]
        .failure_details
        .as_deref()
        .expect("details")
        .contains("Heading not found"));
    assert_eq!(output.report.processed_links[1].status, ProcessStatus::Extracted);
}

#[test]
fn internal_links_are_dropped_outright() {
    let corpus = Corpus::new();
    let source = corpus.write("a.md", "# Here\n\n[self](#Here)\n[other](./b.md#Intro)\n");
    corpus.write("b.md", "## Intro\n\nbody\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    assert_eq!(output.stats.total_links, 1);
    assert_eq!(output.report.processed_links.len(), 1);
}

#[test]
fn occurrence_accounting_matches_totals() {
    let corpus = Corpus::new();
    let source = corpus.write(
        "a.md",
        "[a](./b.md#Intro)\n[b](./b.md#Intro)\n[c](./b.md)\n[d](./ghost.md#X)\n",
    );
    corpus.write("b.md", "## Intro\n\nbody\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    let occurrences: usize = output
        .entries
        .iter()
        .map(|entry| entry.block.source_links.len())
        .sum();
    let skipped_or_failed = output
        .report
        .processed_links
        .iter()
        .filter(|entry| entry.status != ProcessStatus::Extracted)
        .count();
    assert_eq!(occurrences + skipped_or_failed, output.stats.total_links);
}

#[test]
fn json_rendering_leads_with_total_length() {
    let corpus = Corpus::new();
    let source = corpus.write("a.md", "[Intro](./b.md#Intro)\n");
    corpus.write("b.md", "## Intro\n\nbody\n");

    let (links, parsed_files) = enriched_links(&corpus, &source);
    let output = ContentExtractor::new(parsed_files)
        .extract_content(&links, &ExtractFlags::default());

    let value = output.to_json().expect("render json");
    let blocks = value
        .get("extractedContentBlocks")
        .and_then(|blocks| blocks.as_object())
        .expect("blocks object");
    let mut keys = blocks.keys();
    assert_eq!(
        keys.next().map(String::as_str),
        Some("_totalContentCharacterLength")
    );
    assert!(value.get("stats").is_some());
    assert!(value.get("outgoingLinksReport").is_some());
}
