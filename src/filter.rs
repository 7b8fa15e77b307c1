//! The protocol every pipeline stage implements, plus helpers shared by
//! the pattern-rewrite filters.

use std::ops::Range;
use std::time::{Duration, Instant};

use crate::backend::Services;
use crate::cache::ResolutionCache;
use crate::config::RenderConfig;
use crate::context::{Context, ContextKey};
use crate::document::{Document, NodeId};
use crate::error::{FilterError, FilterErrorKind};
use crate::result::RenderResult;

/// Text under these elements is never rewritten by pattern filters.
pub const IGNORE_PARENTS: &[&str] = &[
    "a", "code", "gl-emoji", "kbd", "pre", "script", "style", "textarea",
];

/// Which wall-clock budget a filter runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCategory {
    /// Tree-walking filters.
    Html,
    /// The sanitizer.
    Sanitize,
    /// Regex-driven text filters.
    Text,
}

impl FilterCategory {
    /// The configured budget for this category.
    pub const fn budget(self, config: &RenderConfig) -> Duration {
        return match self {
            Self::Html => config.timeouts.html(),
            Self::Sanitize => config.timeouts.sanitize(),
            Self::Text => config.timeouts.text(),
        };
    }
}

/// A filter ran past its deadline. Its effect is discarded by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("filter deadline exceeded")]
pub struct DeadlineExceeded;

/// Wall-clock cutoff checked cooperatively inside filter loops.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    /// `None` never expires.
    expires: Option<Instant>,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        return Self {
            expires: Instant::now().checked_add(budget),
        };
    }

    /// A deadline that never passes.
    pub const fn unlimited() -> Self {
        return Self { expires: None };
    }

    /// Fail once the deadline has passed.
    ///
    /// # Errors
    ///
    /// Returns `DeadlineExceeded` at or after the cutoff.
    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        return match self.expires {
            Some(expires) if Instant::now() >= expires => Err(DeadlineExceeded),
            _ => Ok(()),
        };
    }
}

/// Everything a filter sees besides the document: read-only configuration,
/// collaborators, the shared result accumulator, and the run's cache.
pub struct FilterContext<'a> {
    /// Resolution memo for this run.
    pub cache: &'a mut ResolutionCache,
    /// Pipeline configuration.
    pub config: &'a RenderConfig,
    /// Caller options.
    pub context: &'a Context,
    /// Cutoff for the running filter.
    deadline: Deadline,
    /// Shared accumulator.
    pub result: &'a mut RenderResult,
    /// Collaborators.
    pub services: &'a Services<'a>,
}

impl<'a> FilterContext<'a> {
    /// Bundle the pieces of one run. The deadline starts unlimited; the
    /// pipeline arms it before each filter.
    pub fn new(
        context: &'a Context,
        config: &'a RenderConfig,
        services: &'a Services<'a>,
        result: &'a mut RenderResult,
        cache: &'a mut ResolutionCache,
    ) -> Self {
        return Self {
            cache,
            config,
            context,
            deadline: Deadline::unlimited(),
            result,
            services,
        };
    }

    /// Replace the current deadline.
    pub const fn arm(&mut self, deadline: Deadline) {
        self.deadline = deadline;
    }

    /// Cooperative timeout check; call at bounded loop intervals.
    ///
    /// # Errors
    ///
    /// Returns `DeadlineExceeded` once the current filter's budget is spent.
    pub fn checkpoint(&self) -> Result<(), DeadlineExceeded> {
        return self.deadline.check();
    }

    /// Prefix for internal links: empty with `only_path`, the base URL otherwise.
    pub fn link_prefix(&self) -> &str {
        if self.context.only_path {
            return "";
        }
        return self.config.base_url.trim_end_matches('/');
    }

    /// Matches a single filter may process.
    pub const fn item_limit(&self) -> usize {
        return self.config.limits.reference_item_limit;
    }

    /// Record that `filter` stopped at the item limit.
    pub fn record_item_limit(&mut self, filter: &'static str) {
        let limit = self.item_limit();
        tracing::warn!(filter, limit, "item limit reached, remaining matches left as text");
        self.result.record(FilterError::new(
            filter,
            FilterErrorKind::ItemLimit,
            format!("processed the first {limit} matches"),
        ));
    }
}

/// One transformation stage.
pub trait Filter: Send + Sync {
    /// Stable name used in logs, timings and errors.
    fn name(&self) -> &'static str;

    /// Budget category.
    fn category(&self) -> FilterCategory;

    /// Context keys that must be present before the pipeline starts.
    fn required_keys(&self) -> &'static [ContextKey] {
        return &[];
    }

    /// Transform `doc` in place.
    ///
    /// # Errors
    ///
    /// Returns `DeadlineExceeded` if a checkpoint fires; the pipeline then
    /// discards everything this call did.
    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded>;

    /// Runs after a timed-out `call` has been rolled back. Filters whose
    /// skipped effect would leave unsafe output override this to fail
    /// closed; it must not check the deadline.
    fn on_timeout(&self, _doc: &mut Document, _result: &mut RenderResult) {}
}

// ── Text rewriting helpers ─────────────────────────────────────────────

/// Whether a text node may be rewritten by a pattern filter: not under an
/// [`IGNORE_PARENTS`] element and not under markup already tagged `gfm`.
pub fn is_rewritable_text(doc: &Document, node: NodeId) -> bool {
    if doc.text(node).is_none() {
        return false;
    }
    return !doc.has_ancestor(node, |a| {
        doc.tag(a).is_some_and(|t| IGNORE_PARENTS.contains(&t)) || doc.has_class(a, "gfm")
    });
}

/// Attached, rewritable text nodes in document order.
pub fn rewritable_text_nodes(doc: &Document) -> Vec<NodeId> {
    return doc
        .text_nodes()
        .into_iter()
        .filter(|&n| is_rewritable_text(doc, n))
        .collect();
}

/// Replace byte ranges of a text node by prebuilt nodes, keeping the text
/// between and around them exactly. Ranges must be sorted and disjoint.
pub fn splice_text(doc: &mut Document, node: NodeId, replacements: Vec<(Range<usize>, NodeId)>) {
    if replacements.is_empty() {
        return;
    }
    let Some(text) = doc.text(node).map(str::to_string) else {
        return;
    };

    let mut pieces = Vec::with_capacity(replacements.len().saturating_mul(2).saturating_add(1));
    let mut cursor = 0;
    for (range, replacement) in replacements {
        if range.start < cursor || range.end > text.len() {
            continue;
        }
        if let Some(before) = text.get(cursor..range.start).filter(|s| !s.is_empty()) {
            pieces.push(doc.create_text(before));
        }
        pieces.push(replacement);
        cursor = range.end;
    }
    if let Some(after) = text.get(cursor..).filter(|s| !s.is_empty()) {
        pieces.push(doc.create_text(after));
    }
    doc.replace(node, &pieces);
}

/// Whether the byte before `start` in `text` is a word character or slash,
/// meaning a match starting there is glued to preceding text.
pub fn glued_to_previous(text: &str, start: usize) -> bool {
    return text
        .get(..start)
        .and_then(|before| before.chars().next_back())
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '/');
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
    use super::*;

    #[test]
    fn zero_budget_deadline_fires_immediately() {
        assert_eq!(Deadline::after(Duration::ZERO).check(), Err(DeadlineExceeded));
        assert_eq!(Deadline::unlimited().check(), Ok(()));
    }

    #[test]
    fn rewritable_skips_ignored_parents_and_gfm() {
        let doc = Document::parse(
            "<p>plain</p><pre>pre</pre><code>code</code><a>a</a><style>s</style><span class=\"gfm\">g</span>",
        );
        let texts: Vec<String> = rewritable_text_nodes(&doc)
            .into_iter()
            .filter_map(|n| doc.text(n).map(str::to_string))
            .collect();
        assert_eq!(texts, vec!["plain".to_string()]);
    }

    #[test]
    fn splice_preserves_surrounding_text() {
        let mut doc = Document::parse("<p>a #1 b</p>");
        let text = doc.text_nodes()[0];
        let b = doc.create_element("b");
        splice_text(&mut doc, text, vec![(2..4, b)]);
        assert_eq!(doc.to_html(), "<p>a <b></b> b</p>");
    }

    #[test]
    fn glued_detection() {
        assert!(glued_to_previous("foo#1", 3));
        assert!(!glued_to_previous("foo #1", 4));
        assert!(!glued_to_previous("#1", 0));
    }
}
