use std::sync::LazyLock;

use regex::Regex;

use crate::document::Document;
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// Hex, `rgb[a]()` and `hsl[a]()` color literals.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:#(?:[0-9A-Fa-f]{3}|[0-9A-Fa-f]{4}|[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})|(?:rgb|hsl)a?\(\s*\d{1,3}%?\s*,\s*\d{1,3}%?\s*,\s*\d{1,3}%?\s*(?:,\s*(?:0|1|0?\.\d+)\s*)?\))$",
    )
    .expect("valid regex")
});

/// Appends a color swatch to inline code that contains only a color value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorChip;

impl Filter for ColorChip {
    fn name(&self) -> &'static str {
        return "color";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        for code in doc.elements_named("code") {
            cx.checkpoint()?;
            if doc.is_inside(code, &["pre"]) || doc.children(code).len() != 1 {
                continue;
            }
            let value = doc.text_content(code);
            let value = value.trim();
            if !COLOR.is_match(value) {
                continue;
            }
            let chip = doc.create_element_with("span", &[("class", "gfm-color_chip")]);
            let swatch = doc.create_element_with("span", &[("style", &format!("background-color: {value}"))]);
            doc.append(chip, swatch);
            doc.append(code, chip);
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
    fn hex_and_functional_colors_get_chips() {
        for value in ["#F00", "#ff0000aa", "rgb(0, 128, 255)", "hsla(120, 50%, 50%, 0.5)"] {
            let (html, _) = run_filter(&ColorChip, &format!("<code>{value}</code>"), &Context::default());
            assert!(html.contains("<span class=\"gfm-color_chip\">"), "{value}: {html}");
        }
    }

    #[test]
    fn non_colors_and_blocks_are_ignored() {
        for html in ["<code>#zzz</code>", "<code>red</code>", "<pre><code>#fff</code></pre>"] {
            assert_eq!(run_filter(&ColorChip, html, &Context::default()).0, html);
        }
    }

    #[test]
    fn idempotent() {
        let (once, _) = run_filter(&ColorChip, "<code>#abc</code>", &Context::default());
        assert_eq!(
            once,
            "<code>#abc<span class=\"gfm-color_chip\"><span style=\"background-color: #abc\"></span></span></code>"
        );
        assert_eq!(run_filter(&ColorChip, &once, &Context::default()).0, once);
    }
}
