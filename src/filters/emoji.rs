use std::sync::LazyLock;

use regex::Regex;

use crate::document::Document;
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext, rewritable_text_nodes, splice_text};

/// `:name:` shortcodes.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-z0-9_+\-]+):").expect("valid regex"));

/// Replaces `:shortcode:` with a `<gl-emoji>` element carrying the Unicode
/// character. Unknown shortcodes stay as typed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Emoji;

impl Emoji {
    /// `fallback_root` is the caller's `asset_root`; when set, the element
    /// names a PNG for clients without the glyph.
    fn element(
        doc: &mut Document,
        emoji: &'static emojis::Emoji,
        shortcode: &str,
        fallback_root: Option<&str>,
    ) -> crate::document::NodeId {
        let version = emoji.unicode_version();
        let version = format!("{}.{}", version.major(), version.minor());
        let fallback = fallback_root.map(|root| format!("{}/emoji/{shortcode}.png", root.trim_end_matches('/')));
        let mut attrs = vec![
            ("data-name", shortcode),
            ("data-unicode-version", version.as_str()),
            ("title", emoji.name()),
        ];
        if let Some(fallback) = &fallback {
            attrs.insert(0, ("data-fallback-src", fallback.as_str()));
        }
        let node = doc.create_element_with("gl-emoji", &attrs);
        let glyph = doc.create_text(emoji.as_str());
        doc.append(node, glyph);
        return node;
    }
}

impl Filter for Emoji {
    fn name(&self) -> &'static str {
        return "emoji";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Text;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        let limit = cx.item_limit();
        let mut replaced = 0_usize;

        'nodes: for node in rewritable_text_nodes(doc) {
            cx.checkpoint()?;
            let Some(text) = doc.text(node).map(str::to_string) else {
                continue;
            };

            let mut replacements = Vec::new();
            for caps in SHORTCODE.captures_iter(&text) {
                let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                let Some(emoji) = emojis::get_by_shortcode(code.as_str()) else {
                    continue;
                };
                if replaced >= limit {
                    splice_text(doc, node, replacements);
                    cx.record_item_limit(self.name());
                    break 'nodes;
                }
                let element = Self::element(doc, emoji, code.as_str(), cx.context.asset_root.as_deref());
                replacements.push((whole.range(), element));
                replaced = replaced.saturating_add(1);
            }
            splice_text(doc, node, replacements);
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
    fn known_shortcodes_become_gl_emoji() {
        let (html, _) = run_filter(&Emoji, "<p>ship it :rocket:!</p>", &Context::default());
        assert!(html.starts_with("<p>ship it <gl-emoji data-name=\"rocket\""), "{html}");
        assert!(html.ends_with(">🚀</gl-emoji>!</p>"), "{html}");
    }

    #[test]
    fn asset_root_sets_fallback_image() {
        let context = Context {
            asset_root: Some("https://assets.test/".to_string()),
            ..Context::default()
        };
        let (html, _) = run_filter(&Emoji, "<p>:rocket:</p>", &context);
        assert!(
            html.starts_with("<p><gl-emoji data-fallback-src=\"https://assets.test/emoji/rocket.png\" data-name=\"rocket\""),
            "{html}"
        );
        let (plain, _) = run_filter(&Emoji, "<p>:rocket:</p>", &Context::default());
        assert!(!plain.contains("data-fallback-src"), "{plain}");
    }

    #[test]
    fn unknown_shortcodes_and_code_are_untouched() {
        for html in ["<p>:not_an_emoji_at_all:</p>", "<code>:rocket:</code>"] {
            let (out, _) = run_filter(&Emoji, html, &Context::default());
            assert_eq!(out, html);
        }
    }

    #[test]
    fn rerunning_does_not_double_replace() {
        let (once, _) = run_filter(&Emoji, "<p>:tada: :tada:</p>", &Context::default());
        let (twice, _) = run_filter(&Emoji, &once, &Context::default());
        assert_eq!(once, twice);
        assert_eq!(once.matches("<gl-emoji").count(), 2);
    }
}
