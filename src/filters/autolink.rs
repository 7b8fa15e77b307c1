use linkify::{LinkFinder, LinkKind};

use crate::document::Document;
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext, rewritable_text_nodes, splice_text};

/// Turns bare URLs in text into links.
#[derive(Debug, Clone, Copy, Default)]
pub struct Autolink;

impl Filter for Autolink {
    fn name(&self) -> &'static str {
        return "autolink";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Text;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        let mut finder = LinkFinder::new();
        finder.kinds(&[LinkKind::Url]);
        finder.url_must_have_scheme(true);

        let limit = cx.item_limit();
        let mut linked = 0_usize;

        'nodes: for node in rewritable_text_nodes(doc) {
            cx.checkpoint()?;
            let Some(text) = doc.text(node).map(str::to_string) else {
                continue;
            };

            let mut replacements = Vec::new();
            for link in finder.links(&text) {
                if linked >= limit {
                    splice_text(doc, node, replacements);
                    cx.record_item_limit(self.name());
                    break 'nodes;
                }
                let url = link.as_str();
                let anchor = doc.create_element_with("a", &[("href", url)]);
                let label = doc.create_text(url);
                doc.append(anchor, label);
                replacements.push((link.start()..link.end(), anchor));
                linked = linked.saturating_add(1);
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
    fn links_bare_urls() {
        let (html, _) = run_filter(&Autolink, "<p>See http://example.com/</p>", &Context::default());
        assert_eq!(html, "<p>See <a href=\"http://example.com/\">http://example.com/</a></p>");
    }

    #[test]
    fn skips_preformatted_and_existing_links() {
        for html in ["<pre>See http://example.com/</pre>", "<a href=\"/x\">http://example.com/</a>", "<code>http://a.test</code>"] {
            let (out, _) = run_filter(&Autolink, html, &Context::default());
            assert_eq!(out, html);
        }
    }

    #[test]
    fn trailing_punctuation_stays_outside() {
        let (html, _) = run_filter(&Autolink, "<p>(https://a.test/x).</p>", &Context::default());
        assert_eq!(html, "<p>(<a href=\"https://a.test/x\">https://a.test/x</a>).</p>");
    }

    #[test]
    fn running_twice_changes_nothing() {
        let (once, _) = run_filter(&Autolink, "<p>go https://a.test now</p>", &Context::default());
        let (twice, _) = run_filter(&Autolink, &once, &Context::default());
        assert_eq!(once, twice);
    }
}
