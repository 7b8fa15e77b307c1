use crate::document::Document;
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};
use crate::filters::external_link::{external_host, internal_hosts};

/// Routes external images through the configured asset proxy, keeping the
/// original address in `data-canonical-src`. A no-op without a proxy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetProxy;

impl Filter for AssetProxy {
    fn name(&self) -> &'static str {
        return "asset_proxy";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        let Some(proxy) = cx.services.asset_proxy else {
            return Ok(());
        };
        let internal = internal_hosts(cx);
        for img in doc.elements_named("img") {
            cx.checkpoint()?;
            if doc.attr(img, "data-canonical-src").is_some() {
                continue;
            }
            let Some(src) = doc.attr(img, "src").map(str::to_string) else {
                continue;
            };
            if external_host(&src, &internal).is_none() {
                continue;
            }
            doc.set_attr(img, "src", &proxy.rewrite(&src));
            doc.set_attr(img, "data-canonical-src", &src);
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
    use crate::backend::{NullBackend, Services};
    use crate::context::Context;
    use crate::filters::{run_filter, run_filter_with};

    struct Camo;

    impl crate::backend::AssetProxy for Camo {
        fn rewrite(&self, url: &str) -> String {
            return format!("https://proxy.test/?u={url}");
        }
    }

    #[test]
    fn external_images_are_proxied() {
        let services = Services::new(&NullBackend, &NullBackend).with_asset_proxy(&Camo);
        let (html, _) = run_filter_with(&AssetProxy, "<img src=\"https://x.test/a.png\"><img src=\"/local.png\">", &Context::default(), &services);
        assert_eq!(
            html,
            "<img data-canonical-src=\"https://x.test/a.png\" src=\"https://proxy.test/?u=https://x.test/a.png\"><img src=\"/local.png\">"
        );
        let (again, _) = run_filter_with(&AssetProxy, &html, &Context::default(), &services);
        assert_eq!(again, html);
    }

    #[test]
    fn without_proxy_nothing_changes() {
        let html = "<img src=\"https://x.test/a.png\">";
        assert_eq!(run_filter(&AssetProxy, html, &Context::default()).0, html);
    }
}
