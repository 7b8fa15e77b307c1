//! Concrete pipeline stages.

pub mod asset_proxy;
pub mod autolink;
pub mod color;
pub mod emoji;
pub mod external_link;
pub mod footnotes;
pub mod images;
pub mod math;
pub mod placeholders;
pub mod redactor;
pub mod references;
pub mod relative_link;
pub mod sanitization;
pub mod single_line;
pub mod source;
pub mod table_of_contents;
pub mod task_list;
pub mod truncate_visible;
pub mod upload_link;

/// Run a filter once against an HTML fragment with default configuration.
#[cfg(test)]
pub(crate) fn run_filter(
    filter: &dyn crate::filter::Filter,
    html: &str,
    context: &crate::context::Context,
) -> (String, crate::result::RenderResult) {
    let services = crate::backend::Services::default();
    return run_filter_with(filter, html, context, &services);
}

/// Run a filter once with explicit collaborators.
#[cfg(test)]
pub(crate) fn run_filter_with(
    filter: &dyn crate::filter::Filter,
    html: &str,
    context: &crate::context::Context,
    services: &crate::backend::Services<'_>,
) -> (String, crate::result::RenderResult) {
    let config = crate::config::RenderConfig::default();
    let mut result = crate::result::RenderResult::default();
    let mut cache = crate::cache::ResolutionCache::new();
    let mut doc = crate::document::Document::parse(html);
    let mut cx = crate::filter::FilterContext::new(context, &config, services, &mut result, &mut cache);
    #[allow(clippy::expect_used, reason = "test helper")]
    filter
        .call(&mut doc, &mut cx)
        .expect("unlimited deadline never fires");
    drop(cx);
    return (doc.to_html(), result);
}
