//! Anchor verification with suggestion assembly.

use mdcite_parser::{
    kebab_case, percent_decode, url_encoded_heading_id, AnchorKind, ParsedDocument,
};

use crate::CitationValidator;

/// Grade of an anchor against a target document.
pub(crate) enum AnchorCheck {
    Found,
    /// The anchor is the kebab-case rendering of an existing heading;
    /// `encoded` is the preferred URL-encoded heading form.
    KebabBetter {
        encoded: String,
    },
    Missing {
        suggestion: Option<String>,
    },
}

impl CitationValidator {
    /// Escalating match: exact, URL-decoded, caret prefix stripped, then
    /// a flexible comparison with Markdown decorations removed. A miss
    /// first checks for a kebab-case near-hit before assembling
    /// suggestions.
    pub(crate) fn check_anchor(&self, document: &ParsedDocument, raw_anchor: &str) -> AnchorCheck {
        if document.has_anchor(raw_anchor) {
            return AnchorCheck::Found;
        }

        let decoded = percent_decode(raw_anchor);
        if decoded != raw_anchor && document.has_anchor(&decoded) {
            return AnchorCheck::Found;
        }

        if let Some(stripped) = raw_anchor.strip_prefix('^') {
            if document.has_anchor(stripped) {
                return AnchorCheck::Found;
            }
        }

        let flexible = self.strip_decorations(&decoded);
        if !flexible.is_empty()
            && document.anchors().iter().any(|anchor| {
                anchor.id == flexible || self.strip_decorations(&anchor.raw_text) == flexible
            })
        {
            return AnchorCheck::Found;
        }

        for heading in document.headings() {
            if kebab_case(&heading.text) == decoded {
                return AnchorCheck::KebabBetter {
                    encoded: url_encoded_heading_id(&heading.text),
                };
            }
        }

        AnchorCheck::Missing {
            suggestion: build_suggestion(document, &decoded),
        }
    }

    /// Strip backticks, emphasis, highlight markers, and link syntax so
    /// an anchor written against a decorated heading still matches.
    pub(crate) fn strip_decorations(&self, text: &str) -> String {
        let unlinked = self
            .patterns
            .link_decoration
            .replace_all(text, "$1")
            .into_owned();
        let cleaned: String = unlinked
            .chars()
            .filter(|ch| !matches!(ch, '`' | '*' | '='))
            .collect();
        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Up to three similar anchors, the first five known headers
/// (`raw → id`), and the first five block refs.
fn build_suggestion(document: &ParsedDocument, decoded: &str) -> Option<String> {
    let mut parts = Vec::new();

    let similar = document.find_similar_anchors(decoded, 3);
    if !similar.is_empty() {
        let rendered: Vec<String> = similar.iter().map(|anchor| format!("#{anchor}")).collect();
        parts.push(format!("Similar anchors: {}", rendered.join(", ")));
    }

    let headers: Vec<String> = document
        .anchors()
        .iter()
        .filter(|anchor| anchor.kind == AnchorKind::Header)
        .take(5)
        .map(|anchor| {
            let id = anchor
                .url_encoded_id
                .clone()
                .unwrap_or_else(|| anchor.id.clone());
            format!("\"{}\" → #{id}", anchor.raw_text)
        })
        .collect();
    if !headers.is_empty() {
        parts.push(format!("Known headers: {}", headers.join(", ")));
    }

    let blocks: Vec<String> = document
        .anchors()
        .iter()
        .filter(|anchor| anchor.kind == AnchorKind::Block)
        .take(5)
        .map(|anchor| format!("^{}", anchor.id))
        .collect();
    if !blocks.is_empty() {
        parts.push(format!("Known block refs: {}", blocks.join(", ")));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(". "))
    }
}
