use crate::document::Document;
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// `rel` set on links leaving the site.
const EXTERNAL_REL: &str = "nofollow noreferrer noopener";

/// Hosts that count as part of this installation: the base URL's host and
/// the asset host.
pub fn internal_hosts(cx: &FilterContext<'_>) -> Vec<String> {
    let mut hosts = Vec::new();
    for origin in std::iter::once(cx.config.base_url.as_str()).chain(cx.context.asset_host.as_deref()) {
        if let Ok(parsed) = url::Url::parse(origin)
            && let Some(host) = parsed.host_str()
        {
            hosts.push(host.to_ascii_lowercase());
        }
    }
    return hosts;
}

/// The host of an absolute `http(s)` URL that is not internal.
pub fn external_host(href: &str, internal: &[String]) -> Option<String> {
    let parsed = url::Url::parse(href).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    return (!internal.contains(&host)).then_some(host);
}

/// Opens links to other hosts in a new tab without leaking the referrer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalLink;

impl Filter for ExternalLink {
    fn name(&self) -> &'static str {
        return "external_link";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        let internal = internal_hosts(cx);
        for anchor in doc.elements_named("a") {
            cx.checkpoint()?;
            let external = doc.attr(anchor, "href").and_then(|href| external_host(href, &internal));
            if external.is_none() {
                continue;
            }
            doc.set_attr(anchor, "rel", EXTERNAL_REL);
            doc.set_attr(anchor, "target", "_blank");
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
    fn external_links_get_rel_and_target() {
        let (html, _) = run_filter(&ExternalLink, "<a href=\"https://other.test/x\">x</a>", &Context::default());
        assert_eq!(
            html,
            "<a href=\"https://other.test/x\" rel=\"nofollow noreferrer noopener\" target=\"_blank\">x</a>"
        );
    }

    #[test]
    fn internal_and_relative_links_are_untouched() {
        let context = Context {
            asset_host: Some("https://assets.test".to_string()),
            ..Context::default()
        };
        for html in ["<a href=\"http://localhost/a\">x</a>", "<a href=\"/a\">x</a>", "<a href=\"https://assets.test/i\">x</a>", "<a href=\"mailto:a@b.test\">x</a>"] {
            assert_eq!(run_filter(&ExternalLink, html, &context).0, html);
        }
    }
}
