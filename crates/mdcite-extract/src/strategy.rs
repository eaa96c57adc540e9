//! Eligibility strategy chain.
//!
//! The chain is ordered by precedence: a force marker overrides the
//! full-files gate, so reordering is a behaviour change.

use mdcite_parser::{AnchorKind, Link, LinkScope};

/// Flags steering extraction, typically sourced from config or the CLI.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtractFlags {
    pub full_files: bool,
}

/// Verdict of a strategy: extract or skip, with the reason recorded in
/// the report.
#[derive(Clone, Debug)]
pub struct Decision {
    pub eligible: bool,
    pub reason: String,
}

impl Decision {
    fn eligible(reason: impl Into<String>) -> Option<Decision> {
        Some(Decision {
            eligible: true,
            reason: reason.into(),
        })
    }

    fn ineligible(reason: impl Into<String>) -> Option<Decision> {
        Some(Decision {
            eligible: false,
            reason: reason.into(),
        })
    }
}

/// One rule in the chain; `None` delegates to the next strategy.
pub trait EligibilityStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, link: &Link, flags: &ExtractFlags) -> Option<Decision>;
}

/// `%%force-extract%%` wins over every other rule.
pub struct ForceMarkerStrategy;

impl EligibilityStrategy for ForceMarkerStrategy {
    fn name(&self) -> &'static str {
        "force-marker"
    }

    fn evaluate(&self, link: &Link, _flags: &ExtractFlags) -> Option<Decision> {
        if link.marker_text() == Some("force-extract") {
            Decision::eligible("force-extract overrides defaults")
        } else {
            None
        }
    }
}

/// `%%no-extract%%` suppresses an otherwise eligible link.
pub struct SuppressMarkerStrategy;

impl EligibilityStrategy for SuppressMarkerStrategy {
    fn name(&self) -> &'static str {
        "suppress-marker"
    }

    fn evaluate(&self, link: &Link, _flags: &ExtractFlags) -> Option<Decision> {
        if link.marker_text() == Some("no-extract") {
            Decision::ineligible("no-extract marker")
        } else {
            None
        }
    }
}

/// Header-anchored cross-document links extract their section.
pub struct SectionLinkStrategy;

impl EligibilityStrategy for SectionLinkStrategy {
    fn name(&self) -> &'static str {
        "section-link"
    }

    fn evaluate(&self, link: &Link, _flags: &ExtractFlags) -> Option<Decision> {
        if link.anchor_type == Some(AnchorKind::Header) && link.scope != LinkScope::Internal {
            Decision::eligible("section link")
        } else {
            None
        }
    }
}

/// Block-anchored links extract their block.
pub struct BlockLinkStrategy;

impl EligibilityStrategy for BlockLinkStrategy {
    fn name(&self) -> &'static str {
        "block-link"
    }

    fn evaluate(&self, link: &Link, _flags: &ExtractFlags) -> Option<Decision> {
        if link.anchor_type == Some(AnchorKind::Block) {
            Decision::eligible("block link")
        } else {
            None
        }
    }
}

/// Anchor-less links extract the whole file, but only behind the flag.
pub struct FullFileStrategy;

impl EligibilityStrategy for FullFileStrategy {
    fn name(&self) -> &'static str {
        "full-file"
    }

    fn evaluate(&self, link: &Link, flags: &ExtractFlags) -> Option<Decision> {
        if link.anchor_type.is_some() {
            return None;
        }
        if flags.full_files {
            Decision::eligible("full-file extraction enabled")
        } else {
            Decision::ineligible("full-file extraction requires --full-files flag")
        }
    }
}

/// The default chain, in precedence order.
pub fn default_chain() -> Vec<Box<dyn EligibilityStrategy>> {
    vec![
        Box::new(ForceMarkerStrategy),
        Box::new(SuppressMarkerStrategy),
        Box::new(SectionLinkStrategy),
        Box::new(BlockLinkStrategy),
        Box::new(FullFileStrategy),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdcite_parser::MarkdownParser;
    use std::path::Path;

    fn first_link(content: &str) -> Link {
        MarkdownParser::new()
            .parse_str(Path::new("/vault/a.md"), content)
            .links()
            .first()
            .cloned()
            .expect("one link")
    }

    fn decide(link: &Link, flags: &ExtractFlags) -> Decision {
        for strategy in default_chain() {
            if let Some(decision) = strategy.evaluate(link, flags) {
                return decision;
            }
        }
        panic!("chain must settle every link");
    }

    #[test]
    fn force_marker_beats_full_file_gate() {
        let link = first_link("[X](./b.md) %%force-extract%%\n");
        let decision = decide(&link, &ExtractFlags { full_files: false });
        assert!(decision.eligible);
        assert!(decision.reason.contains("force-extract"));
    }

    #[test]
    fn no_extract_marker_suppresses_section_links() {
        let link = first_link("[X](./b.md#Intro) <!-- no-extract -->\n");
        let decision = decide(&link, &ExtractFlags::default());
        assert!(!decision.eligible);
        assert_eq!(decision.reason, "no-extract marker");
    }

    #[test]
    fn section_and_block_links_are_eligible_by_default() {
        let section = first_link("[X](./b.md#Intro)\n");
        assert!(decide(&section, &ExtractFlags::default()).eligible);

        let block = first_link("[X](./b.md#^ref-1)\n");
        assert!(decide(&block, &ExtractFlags::default()).eligible);
    }

    #[test]
    fn full_file_links_need_the_flag() {
        let link = first_link("[X](./b.md)\n");
        let denied = decide(&link, &ExtractFlags { full_files: false });
        assert!(!denied.eligible);
        assert!(denied.reason.contains("--full-files"));

        let allowed = decide(&link, &ExtractFlags { full_files: true });
        assert!(allowed.eligible);
    }
}
