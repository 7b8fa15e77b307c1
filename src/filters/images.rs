//! Image post-processing: deferred loading and click-through links.

use crate::document::Document;
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// Moves `src` to `data-src` so images load when scrolled into view.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLazyLoad;

impl Filter for ImageLazyLoad {
    fn name(&self) -> &'static str {
        return "image_lazy_load";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        for img in doc.elements_named("img") {
            cx.checkpoint()?;
            if doc.attr(img, "data-src").is_some() {
                continue;
            }
            let Some(src) = doc.remove_attr(img, "src") else {
                continue;
            };
            doc.set_attr(img, "data-src", &src);
            doc.set_attr(img, "decoding", "async");
            doc.add_class(img, "lazy");
        }
        return Ok(());
    }
}

/// Wraps images that are not already linked in a link to the full image.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLink;

impl Filter for ImageLink {
    fn name(&self) -> &'static str {
        return "image_link";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        for img in doc.elements_named("img") {
            cx.checkpoint()?;
            if doc.is_inside(img, &["a"]) {
                continue;
            }
            let target = doc
                .attr(img, "data-canonical-src")
                .or_else(|| doc.attr(img, "data-src"))
                .or_else(|| doc.attr(img, "src"))
                .map(str::to_string);
            let Some(target) = target else {
                continue;
            };
            let link = doc.create_element_with("a", &[
                ("class", "no-attachment-icon"),
                ("href", &target),
                ("rel", "noopener noreferrer"),
                ("target", "_blank"),
            ]);
            doc.wrap(img, link);
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
    fn lazy_load_moves_src() {
        let (html, _) = run_filter(&ImageLazyLoad, "<img alt=\"a\" src=\"/i.png\">", &Context::default());
        assert_eq!(html, "<img alt=\"a\" class=\"lazy\" data-src=\"/i.png\" decoding=\"async\">");
        assert_eq!(run_filter(&ImageLazyLoad, &html, &Context::default()).0, html);
    }

    #[test]
    fn image_link_wraps_unlinked_images() {
        let (html, _) = run_filter(&ImageLink, "<p><img src=\"/i.png\"></p>", &Context::default());
        assert_eq!(
            html,
            "<p><a class=\"no-attachment-icon\" href=\"/i.png\" rel=\"noopener noreferrer\" target=\"_blank\"><img src=\"/i.png\"></a></p>"
        );
        assert_eq!(run_filter(&ImageLink, &html, &Context::default()).0, html);
    }
}
