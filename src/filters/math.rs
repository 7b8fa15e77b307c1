use crate::document::{Document, NodeId};
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// Classes the client-side renderer looks for.
const MATH_CLASSES: &[&str] = &["code", "math", "js-render-math"];

/// Marks math for client-side rendering: inline `` $`x`$ `` and fenced
/// `math` blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Math;

impl Math {
    /// Tag `node` as math in `style` (`inline` or `display`).
    fn mark(doc: &mut Document, node: NodeId, style: &str) {
        for class in MATH_CLASSES {
            doc.add_class(node, class);
        }
        doc.set_attr(node, "data-math-style", style);
    }

    /// Strip the `$` delimiters around an inline `code` element. Returns
    /// whether both were present.
    fn take_dollars(doc: &mut Document, code: NodeId) -> bool {
        let (Some(before), Some(after)) = (doc.previous_sibling(code), doc.next_sibling(code)) else {
            return false;
        };
        let (Some(left), Some(right)) = (doc.text(before), doc.text(after)) else {
            return false;
        };
        let (Some(left), Some(right)) = (left.strip_suffix('$'), right.strip_prefix('$')) else {
            return false;
        };
        let (left, right) = (left.to_string(), right.to_string());
        doc.set_text(before, left);
        doc.set_text(after, right);
        return true;
    }
}

impl Filter for Math {
    fn name(&self) -> &'static str {
        return "math";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        for code in doc.elements_named("code") {
            cx.checkpoint()?;
            if doc.has_class(code, "math") {
                continue;
            }
            match doc.parent(code) {
                Some(pre) if doc.is_element(pre, "pre") => {
                    if doc.has_class(code, "language-math") {
                        Self::mark(doc, pre, "display");
                        Self::mark(doc, code, "display");
                    }
                },
                _ => {
                    if Self::take_dollars(doc, code) {
                        Self::mark(doc, code, "inline");
                    }
                },
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
    fn inline_math_loses_dollars() {
        let (html, _) = run_filter(&Math, "<p>x $<code>a^2</code>$ y</p>", &Context::default());
        assert_eq!(
            html,
            "<p>x <code class=\"code math js-render-math\" data-math-style=\"inline\">a^2</code> y</p>"
        );
    }

    #[test]
    fn plain_code_is_untouched() {
        let html = "<p>cost $5 <code>x</code> total</p>";
        assert_eq!(run_filter(&Math, html, &Context::default()).0, html);
    }

    #[test]
    fn fenced_math_block() {
        let (html, _) = run_filter(&Math, "<pre><code class=\"language-math\">x</code></pre>", &Context::default());
        assert!(html.starts_with("<pre class=\"code math js-render-math\" data-math-style=\"display\">"), "{html}");
    }

    #[test]
    fn idempotent() {
        let (once, _) = run_filter(&Math, "<p>$<code>a</code>$</p>", &Context::default());
        assert_eq!(run_filter(&Math, &once, &Context::default()).0, once);
    }
}
