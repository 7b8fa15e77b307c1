use crate::document::Document;
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// Block elements flattened into their inline content.
const BLOCKS: &[&str] = &[
    "blockquote", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ol", "p", "table", "tbody",
    "td", "th", "thead", "tr", "ul",
];

/// Flattens block structure so a document renders on one line: blocks are
/// unwrapped and separated by a space, breaks and rules become spaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleLine;

impl Filter for SingleLine {
    fn name(&self) -> &'static str {
        return "single_line";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        for node in doc.descendants(Document::ROOT) {
            cx.checkpoint()?;
            let Some(tag) = doc.tag(node) else {
                continue;
            };
            if matches!(tag, "br" | "hr") {
                let space = doc.create_text(" ");
                doc.replace(node, &[space]);
                continue;
            }
            if !BLOCKS.contains(&tag) {
                continue;
            }
            if doc.next_sibling(node).is_some() {
                let space = doc.create_text(" ");
                doc.insert_after(node, space);
            }
            doc.unwrap(node);
        }

        for node in doc.text_nodes() {
            let Some(text) = doc.text(node) else {
                continue;
            };
            if doc.is_inside(node, &["pre", "code"]) || !text.contains('\n') {
                continue;
            }
            let flattened = text.replace('\n', " ");
            doc.set_text(node, flattened);
        }
        let collapsed = doc.children(Document::ROOT).iter().all(|&c| doc.text(c).is_some());
        if collapsed {
            let text = doc.text_content(Document::ROOT);
            let trimmed = text.trim();
            if trimmed.len() != text.len() {
                let only = doc.create_text(trimmed);
                doc.clear_children(Document::ROOT);
                doc.append(Document::ROOT, only);
            }
        }
        return Ok(());
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
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::context::Context;
    use crate::filters::run_filter;

    #[test]
    fn paragraphs_collapse_to_one_line() {
        let (html, _) = run_filter(&SingleLine, "<p>Fix <em>bug</em></p>\n<p>second</p>", &Context::default());
        assert_eq!(html, "Fix <em>bug</em>  second");
    }

    #[test]
    fn lists_and_breaks_become_spaces() {
        let (html, _) = run_filter(&SingleLine, "<ul><li>a</li><li>b<br>c</li></ul>", &Context::default());
        assert_eq!(html, "a b c");
    }
}
