//! Named filter chains and the loop that drives them.
//!
//! A [`Pipeline`] is an ordered list of filters followed by exactly one
//! sanitizer. The builder only hands out a pipeline once a sanitizer
//! profile is chosen, so no chain can skip the final sanitize step.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::backend::Services;
use crate::cache::ResolutionCache;
use crate::config::RenderConfig;
use crate::context::Context;
use crate::document::Document;
use crate::error::{Error, FilterError, FilterErrorKind};
use crate::filter::{Deadline, Filter, FilterCategory, FilterContext};
use crate::filters::asset_proxy::AssetProxy;
use crate::filters::autolink::Autolink;
use crate::filters::color::ColorChip;
use crate::filters::emoji::Emoji;
use crate::filters::external_link::ExternalLink;
use crate::filters::footnotes::Footnotes;
use crate::filters::images::{ImageLazyLoad, ImageLink};
use crate::filters::math::Math;
use crate::filters::placeholders::Placeholders;
use crate::filters::redactor::Redactor;
use crate::filters::references::reference_filters;
use crate::filters::relative_link::RelativeLink;
use crate::filters::sanitization::{Profile, Sanitization, TIMEOUT_HTML};
use crate::filters::single_line::SingleLine;
use crate::filters::source::{expand_includes, truncate_source};
use crate::filters::table_of_contents::TableOfContents;
use crate::filters::task_list::TaskList;
use crate::filters::truncate_visible::TruncateVisible;
use crate::filters::upload_link::UploadLink;
use crate::result::{FilterTiming, RenderResult, Rendered};

/// The named pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Issue and merge request descriptions: full rendering without a
    /// table of contents, minimal sanitizer profile.
    Description,
    /// Everything: markup, links, references, redaction.
    Full,
    /// Markdown conversion and sanitization only.
    PlainMarkdown,
    /// Already-rendered HTML: redaction for the current user, then sanitization.
    PostProcess,
    /// Titles and one-line summaries.
    SingleLine,
}

impl PipelineKind {
    /// Every kind, for help text and iteration.
    pub const ALL: [Self; 5] = [
        Self::Description,
        Self::Full,
        Self::PlainMarkdown,
        Self::PostProcess,
        Self::SingleLine,
    ];

    /// Name used on the command line and in logs.
    pub const fn name(self) -> &'static str {
        return match self {
            Self::Description => "description",
            Self::Full => "full",
            Self::PlainMarkdown => "plain-markdown",
            Self::PostProcess => "post-process",
            Self::SingleLine => "single-line",
        };
    }

    /// Whether the pipeline consumes HTML rather than markdown.
    const fn takes_html(self) -> bool {
        return matches!(self, Self::PostProcess);
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.name());
    }
}

impl FromStr for PipelineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        return Self::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| Error::UnknownPipeline { name: s.to_string() });
    }
}

/// Collects filters for a pipeline. Finished by choosing a sanitizer.
pub struct PipelineBuilder {
    /// Filters in run order.
    filters: Vec<Box<dyn Filter>>,
    /// Chain being built.
    kind: PipelineKind,
}

impl PipelineBuilder {
    /// Append one filter.
    #[must_use]
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        return self;
    }

    /// Append several filters in order.
    #[must_use]
    pub fn filters<F: Filter + 'static>(mut self, filters: impl IntoIterator<Item = F>) -> Self {
        for filter in filters {
            self.filters.push(Box::new(filter));
        }
        return self;
    }

    /// Close the chain with the sanitizer.
    pub fn sanitize(self, profile: Profile, config: RenderConfig) -> Pipeline {
        return Pipeline {
            config,
            filters: self.filters,
            kind: self.kind,
            sanitizer: Sanitization::new(profile),
        };
    }
}

/// An ordered filter chain ending in the sanitizer.
pub struct Pipeline {
    /// Budgets, limits and base URL.
    config: RenderConfig,
    /// Filters in run order, sanitizer excluded.
    filters: Vec<Box<dyn Filter>>,
    /// Which chain this is.
    kind: PipelineKind,
    /// Always runs last.
    sanitizer: Sanitization,
}

impl Pipeline {
    /// Start an empty chain.
    pub fn builder(kind: PipelineKind) -> PipelineBuilder {
        return PipelineBuilder {
            filters: Vec::new(),
            kind,
        };
    }

    /// The standard chain for `kind`.
    pub fn for_kind(kind: PipelineKind, config: RenderConfig) -> Self {
        let builder = Self::builder(kind);
        return match kind {
            PipelineKind::Full => Self::markup(builder, true).sanitize(Profile::Broad, config),
            PipelineKind::Description => Self::markup(builder, false).sanitize(Profile::Minimal, config),
            PipelineKind::PlainMarkdown => builder.sanitize(Profile::Broad, config),
            PipelineKind::PostProcess => builder.filter(Redactor).sanitize(Profile::Broad, config),
            PipelineKind::SingleLine => builder
                .filter(SingleLine)
                .filter(Emoji)
                .filter(Autolink)
                .filter(ExternalLink)
                .filters(reference_filters())
                .filter(Redactor)
                .filter(TruncateVisible)
                .sanitize(Profile::Minimal, config),
        };
    }

    /// Link rewriting, markup, references and redaction, in that order.
    fn markup(builder: PipelineBuilder, table_of_contents: bool) -> PipelineBuilder {
        let builder = builder
            .filter(Placeholders)
            .filter(AssetProxy)
            .filter(RelativeLink)
            .filter(UploadLink)
            .filter(ImageLazyLoad)
            .filter(ImageLink)
            .filter(Math)
            .filter(ColorChip);
        let builder = if table_of_contents { builder.filter(TableOfContents) } else { builder };
        return builder
            .filter(Autolink)
            .filter(ExternalLink)
            .filter(Emoji)
            .filter(Footnotes)
            .filter(TaskList)
            .filters(reference_filters())
            .filter(Redactor)
            .filter(TruncateVisible);
    }

    /// Which chain this is.
    pub const fn kind(&self) -> PipelineKind {
        return self.kind;
    }

    /// Names of the filters in run order, sanitizer last.
    pub fn filter_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.filters.iter().map(|f| f.name()).collect();
        names.push(self.sanitizer.name());
        return names;
    }

    /// Check every filter's required context keys.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingContextKey` naming the first filter whose
    /// requirement `context` does not satisfy.
    pub fn validate(&self, context: &Context) -> Result<(), Error> {
        let all = self.filters.iter().map(Box::as_ref).chain(std::iter::once::<&dyn Filter>(&self.sanitizer));
        for filter in all {
            if let Some(key) = filter.required_keys().iter().find(|&&key| !context.provides(key)) {
                return Err(Error::MissingContextKey {
                    filter: filter.name(),
                    key: key.name(),
                });
            }
        }
        return Ok(());
    }

    /// Render `input` with a fresh resolution cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingContextKey` before any work if `context`
    /// lacks a key some filter requires. Nothing else fails a run.
    pub fn call(&self, input: &str, context: &Context, services: &Services<'_>) -> Result<Rendered, Error> {
        let mut cache = ResolutionCache::new();
        return self.call_with_cache(input, context, services, &mut cache);
    }

    /// Render `input`, reusing `cache` for lookups. Share a cache only
    /// between runs for the same user and request.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingContextKey` before any work if `context`
    /// lacks a key some filter requires.
    pub fn call_with_cache(
        &self,
        input: &str,
        context: &Context,
        services: &Services<'_>,
        cache: &mut ResolutionCache,
    ) -> Result<Rendered, Error> {
        self.validate(context)?;

        let span = tracing::info_span!("pipeline", kind = self.kind.name());
        let _guard = span.enter();

        let mut result = RenderResult::default();
        let mut doc = self.prepare(input, context, services, &mut result);
        let mut cx = FilterContext::new(context, &self.config, services, &mut result, cache);

        for filter in &self.filters {
            Self::run(filter.as_ref(), &mut doc, &mut cx);
        }
        let html = self.finish(&mut doc, &mut cx);
        drop(cx);

        tracing::debug!(bytes = html.len(), timed_out = result.timed_out, "pipeline finished");
        return Ok(Rendered::new(html, result));
    }

    /// Source hooks and conversion, or HTML parsing for post-processing.
    fn prepare(&self, input: &str, context: &Context, services: &Services<'_>, result: &mut RenderResult) -> Document {
        if self.kind.takes_html() {
            return Document::parse(input);
        }
        let max_includes = context.max_includes.unwrap_or(self.config.limits.max_includes);
        let text = expand_includes(input, context, services, max_includes, result);
        let max_bytes = self.config.limits.max_input_bytes;
        let limit = context.limit.map_or(max_bytes, |limit| limit.min(max_bytes));
        let text = truncate_source(&text, limit, result);
        return services.markdown.convert(&text, context.markdown_engine);
    }

    /// Run one filter under its category budget. On timeout the document
    /// and the accumulator go back to what they were before the call, then
    /// the filter's fail-closed hook runs.
    fn run(filter: &dyn Filter, doc: &mut Document, cx: &mut FilterContext<'_>) {
        let budget = filter.category().budget(cx.config);
        let doc_before = doc.clone();
        let result_before = cx.result.clone();

        cx.arm(Deadline::after(budget));
        let started = Instant::now();
        let outcome = filter.call(doc, cx);
        let elapsed = started.elapsed();
        cx.arm(Deadline::unlimited());

        let timed_out = outcome.is_err();
        if timed_out {
            *doc = doc_before;
            *cx.result = result_before;
            filter.on_timeout(doc, cx.result);
            Self::record_timeout(filter.name(), budget, cx);
        }
        tracing::debug!(filter = filter.name(), micros = micros(elapsed), timed_out, "filter finished");
        cx.result.timings.push(FilterTiming {
            filter: filter.name(),
            micros: micros(elapsed),
            timed_out,
        });
    }

    /// Sanitize and serialize. A sanitizer timeout yields the fixed notice,
    /// never the partially cleaned tree.
    fn finish(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> String {
        let budget = FilterCategory::Sanitize.budget(cx.config);
        cx.arm(Deadline::after(budget));
        let started = Instant::now();
        let outcome = self.sanitizer.call(doc, cx);
        let elapsed = started.elapsed();
        cx.arm(Deadline::unlimited());

        let timed_out = outcome.is_err();
        cx.result.timings.push(FilterTiming {
            filter: self.sanitizer.name(),
            micros: micros(elapsed),
            timed_out,
        });
        if timed_out {
            Self::record_timeout(self.sanitizer.name(), budget, cx);
            return TIMEOUT_HTML.to_string();
        }
        return doc.to_html();
    }

    /// Log and record a timeout for `filter`.
    fn record_timeout(filter: &'static str, budget: Duration, cx: &mut FilterContext<'_>) {
        let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(filter, budget_ms, "filter timed out, effect discarded");
        cx.result.timed_out = true;
        cx.result.record(FilterError::new(
            filter,
            FilterErrorKind::Timeout,
            format!("exceeded its {budget_ms}ms budget"),
        ));
    }
}

/// Elapsed microseconds, saturating.
fn micros(elapsed: Duration) -> u64 {
    return u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
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
    use crate::context::ContextKey;
    use crate::filter::DeadlineExceeded;

    /// Mutates the tree, then reports a timeout.
    struct Runaway;

    impl Filter for Runaway {
        fn name(&self) -> &'static str {
            return "runaway";
        }

        fn category(&self) -> FilterCategory {
            return FilterCategory::Html;
        }

        fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
            doc.clear_children(Document::ROOT);
            cx.result.truncated = true;
            return Err(DeadlineExceeded);
        }
    }

    /// Requires a signed-in user.
    struct NeedsUser;

    impl Filter for NeedsUser {
        fn name(&self) -> &'static str {
            return "needs_user";
        }

        fn category(&self) -> FilterCategory {
            return FilterCategory::Text;
        }

        fn required_keys(&self) -> &'static [ContextKey] {
            return &[ContextKey::CurrentUser];
        }

        fn call(&self, _doc: &mut Document, _cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
            return Ok(());
        }
    }

    #[test]
    fn kinds_parse_by_name() {
        for kind in PipelineKind::ALL {
            assert_eq!(kind.name().parse::<PipelineKind>().unwrap(), kind);
        }
        assert_eq!("single_line".parse::<PipelineKind>().unwrap(), PipelineKind::SingleLine);
        assert!(matches!("gfm".parse::<PipelineKind>(), Err(Error::UnknownPipeline { .. })));
    }

    #[test]
    fn every_kind_ends_with_the_sanitizer() {
        for kind in PipelineKind::ALL {
            let pipeline = Pipeline::for_kind(kind, RenderConfig::default());
            assert_eq!(pipeline.filter_names().last(), Some(&"sanitization"), "{kind}");
        }
    }

    #[test]
    fn redaction_runs_after_every_reference_filter() {
        let names = Pipeline::for_kind(PipelineKind::Full, RenderConfig::default()).filter_names();
        let redactor = names.iter().position(|n| *n == "redactor").unwrap();
        let last_reference = names.iter().rposition(|n| n.ends_with("_reference")).unwrap();
        assert!(last_reference < redactor);
    }

    #[test]
    fn timed_out_filter_effect_is_discarded() {
        let pipeline = Pipeline::builder(PipelineKind::PlainMarkdown)
            .filter(Runaway)
            .sanitize(Profile::Broad, RenderConfig::default());
        let rendered = pipeline.call("hello", &Context::default(), &Services::default()).unwrap();

        assert_eq!(rendered.html, "<p>hello</p>\n");
        assert!(rendered.timed_out);
        assert!(!rendered.truncated);
        assert_eq!(rendered.errors.len(), 1);
        assert_eq!(rendered.errors[0].filter, "runaway");
        assert_eq!(rendered.errors[0].kind, FilterErrorKind::Timeout);
        assert!(rendered.timings[0].timed_out);
    }

    #[test]
    fn missing_context_fails_before_any_work() {
        let pipeline = Pipeline::builder(PipelineKind::Full)
            .filter(NeedsUser)
            .sanitize(Profile::Broad, RenderConfig::default());
        let err = pipeline.call("x", &Context::default(), &Services::default()).unwrap_err();
        assert!(matches!(err, Error::MissingContextKey { filter: "needs_user", key: "current_user" }));
    }

    #[test]
    fn sanitizer_timeout_substitutes_notice() {
        let mut config = RenderConfig::default();
        config.timeouts.sanitize_ms = 0;
        let pipeline = Pipeline::for_kind(PipelineKind::PlainMarkdown, config);
        let rendered = pipeline
            .call("<script>alert(1)</script>", &Context::default(), &Services::default())
            .unwrap();
        assert_eq!(rendered.html, TIMEOUT_HTML);
        assert!(rendered.timed_out);
    }

    #[test]
    fn limit_truncates_source_before_conversion() {
        let pipeline = Pipeline::for_kind(PipelineKind::PlainMarkdown, RenderConfig::default());
        let context = Context {
            limit: Some(5),
            ..Context::default()
        };
        let rendered = pipeline.call("Hello world", &context, &Services::default()).unwrap();
        assert_eq!(rendered.html, "<p>Hello...</p>\n");
        assert!(rendered.truncated);
    }
}
