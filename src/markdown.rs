/// Markdown conversion via pulldown-cmark.
use pulldown_cmark::{Options, Parser, html};

use crate::backend::MarkdownConverter;
use crate::context::MarkdownEngine;
use crate::document::Document;

/// The built-in converter. Raw HTML in the source passes through untouched;
/// the sanitizer at the end of every pipeline is what makes it safe.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMark;

impl CommonMark {
    /// Parser options per dialect.
    fn options(engine: MarkdownEngine) -> Options {
        return match engine {
            MarkdownEngine::Default => {
                Options::ENABLE_TABLES
                    | Options::ENABLE_FOOTNOTES
                    | Options::ENABLE_STRIKETHROUGH
                    | Options::ENABLE_TASKLISTS
            },
            MarkdownEngine::Alternate => Options::empty(),
        };
    }

    /// Convert markdown to an HTML string.
    pub fn to_html(text: &str, engine: MarkdownEngine) -> String {
        let parser = Parser::new_ext(text, Self::options(engine));
        let mut out = String::with_capacity(text.len().saturating_mul(3) / 2);
        html::push_html(&mut out, parser);
        return out;
    }
}

impl MarkdownConverter for CommonMark {
    fn convert(&self, text: &str, engine: MarkdownEngine) -> Document {
        return Document::parse(&Self::to_html(text, engine));
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_assert_message,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    reason = "tests fail by panicking"
)]
mod tests {
    use super::*;

    #[test]
    fn default_engine_renders_tables() {
        let html = CommonMark::to_html("| a |\n|---|\n| b |\n", MarkdownEngine::Default);
        assert!(html.contains("<table>"));
    }

    #[test]
    fn alternate_engine_is_strict_commonmark() {
        let html = CommonMark::to_html("~~gone~~", MarkdownEngine::Alternate);
        assert!(!html.contains("<del>"));
        let html = CommonMark::to_html("~~gone~~", MarkdownEngine::Default);
        assert!(html.contains("<del>gone</del>"));
    }

    #[test]
    fn raw_html_passes_through_to_the_document() {
        let doc = CommonMark.convert("<a href=\"javascript:alert(1)\">x</a>", MarkdownEngine::Default);
        assert_eq!(doc.elements_named("a").len(), 1);
    }
}
