use crate::document::{Document, NodeId};
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// Marks truncated output.
const ELLIPSIS: &str = "...";

/// Cuts rendered output to its first block, first line, and at most
/// `truncate_visible_max_chars` visible characters. Tags stay balanced
/// and links cut mid-text keep their `href`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncateVisible;

impl TruncateVisible {
    /// Detach everything after `node` in document order within the tree.
    fn drop_following(doc: &mut Document, node: NodeId) {
        let mut current = node;
        loop {
            while let Some(next) = doc.next_sibling(current) {
                doc.detach(next);
            }
            match doc.parent(current) {
                Some(parent) if parent != Document::ROOT => current = parent,
                _ => break,
            }
        }
    }

    /// Keep only the first non-blank top-level node. Returns whether
    /// anything was removed.
    fn keep_first_block(doc: &mut Document) -> bool {
        let first = doc
            .children(Document::ROOT)
            .iter()
            .copied()
            .find(|&c| doc.text(c).is_none_or(|t| !t.trim().is_empty()));
        let Some(first) = first else {
            return false;
        };
        let before: Vec<NodeId> = doc
            .children(Document::ROOT)
            .iter()
            .copied()
            .take_while(|&c| c != first)
            .collect();
        for blank in before {
            doc.detach(blank);
        }
        let had_more = doc
            .children(Document::ROOT)
            .iter()
            .skip(1)
            .any(|&c| doc.text(c).is_none_or(|t| !t.trim().is_empty()));
        Self::drop_following(doc, first);
        return had_more;
    }
}

impl Filter for TruncateVisible {
    fn name(&self) -> &'static str {
        return "truncate_visible";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        let Some(max_chars) = cx.context.truncate_visible_max_chars else {
            return Ok(());
        };

        let mut truncated = Self::keep_first_block(doc);
        let mut remaining = max_chars;

        for node in doc.text_nodes() {
            cx.checkpoint()?;
            let Some(text) = doc.text(node) else {
                continue;
            };
            let line = text.split('\n').next().unwrap_or("");
            let cut_newline = line.len() < text.len();
            let chars = line.chars().count();

            if chars <= remaining && !cut_newline {
                remaining = remaining.saturating_sub(chars);
                continue;
            }

            let kept: String = line.chars().take(remaining).collect();
            let has_following = doc.next_sibling(node).is_some()
                || doc.ancestors(node).any(|a| a != Document::ROOT && doc.next_sibling(a).is_some());
            let cut = kept.len() < text.len();
            if cut || has_following {
                let kept = format!("{}{ELLIPSIS}", kept.trim_end());
                doc.set_text(node, kept);
                Self::drop_following(doc, node);
                truncated = true;
            }
            break;
        }

        if truncated {
            cx.result.truncated = true;
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

    fn context(max: usize) -> Context {
        Context {
            truncate_visible_max_chars: Some(max),
            ..Context::default()
        }
    }

    #[test]
    fn cuts_at_char_limit_keeping_tags_balanced() {
        let (html, result) = run_filter(&TruncateVisible, "<p>Hello <a href=\"/x\">wonderful</a> world</p>", &context(10));
        assert_eq!(html, "<p>Hello <a href=\"/x\">wond...</a></p>");
        assert!(result.truncated);
    }

    #[test]
    fn keeps_only_first_block_and_line() {
        let (html, _) = run_filter(&TruncateVisible, "<p>one\ntwo</p><p>three</p>", &context(100));
        assert_eq!(html, "<p>one...</p>");
    }

    #[test]
    fn short_content_is_untouched() {
        let (html, result) = run_filter(&TruncateVisible, "<p>short</p>", &context(100));
        assert_eq!(html, "<p>short</p>");
        assert!(!result.truncated);
    }

    #[test]
    fn multibyte_characters_are_not_split() {
        let (html, _) = run_filter(&TruncateVisible, "<p>日本語のテキスト</p>", &context(3));
        assert_eq!(html, "<p>日本語...</p>");
    }

    #[test]
    fn without_limit_nothing_happens() {
        let html = "<p>a</p><p>b</p>";
        assert_eq!(run_filter(&TruncateVisible, html, &Context::default()).0, html);
    }
}
