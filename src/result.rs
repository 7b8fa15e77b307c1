//! The shared result accumulator and the envelope a pipeline run returns.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::FilterError;
use crate::types::{EntityRef, ReferenceType};

/// Findings accumulated across all filters of one run. Append-only, except
/// that the redaction pass may drop references it unlinked.
#[derive(Debug, Clone, Default)]
pub struct RenderResult {
    /// Recovered failures, in the order they happened.
    pub errors: Vec<FilterError>,
    /// Resolved references per type.
    pub references: BTreeMap<ReferenceType, BTreeSet<EntityRef>>,
    /// Whether any filter ran out of time.
    pub timed_out: bool,
    /// Per-filter wall-clock timings.
    pub timings: Vec<FilterTiming>,
    /// Rendered table of contents, when the document had headings.
    pub toc: Option<String>,
    /// Whether source or visible truncation cut content.
    pub truncated: bool,
}

/// How long one filter took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterTiming {
    /// Filter name.
    pub filter: &'static str,
    /// Elapsed microseconds.
    pub micros: u64,
    /// Whether the filter's effect was discarded for running out of time.
    pub timed_out: bool,
}

impl RenderResult {
    /// Record a resolved reference.
    pub fn add_reference(&mut self, reference: EntityRef) {
        self.references.entry(reference.kind).or_default().insert(reference);
    }

    /// Drop a reference the redaction pass unlinked.
    pub fn redact(&mut self, reference: &EntityRef) {
        if let Some(set) = self.references.get_mut(&reference.kind) {
            set.remove(reference);
            if set.is_empty() {
                self.references.remove(&reference.kind);
            }
        }
    }

    /// Record a recovered failure.
    pub fn record(&mut self, error: FilterError) {
        self.errors.push(error);
    }

    /// Whether any reference of any type was found.
    pub fn has_references(&self) -> bool {
        return self.references.values().any(|set| !set.is_empty());
    }
}

/// Final output of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct Rendered {
    /// Recovered failures.
    pub errors: Vec<FilterError>,
    /// Sanitized HTML.
    pub html: String,
    /// Resolved, non-redacted references per type, sorted by id.
    pub references: BTreeMap<ReferenceType, Vec<EntityRef>>,
    /// Whether any filter ran out of time.
    pub timed_out: bool,
    /// Per-filter timings.
    pub timings: Vec<FilterTiming>,
    /// Table of contents side artifact.
    pub toc: Option<String>,
    /// Whether content was cut by truncation.
    pub truncated: bool,
}

impl Rendered {
    /// Assemble the envelope from the final HTML and the accumulator.
    pub fn new(html: String, result: RenderResult) -> Self {
        let references = result
            .references
            .into_iter()
            .map(|(kind, set)| (kind, set.into_iter().collect()))
            .collect();
        return Self {
            errors: result.errors,
            html,
            references,
            timed_out: result.timed_out,
            timings: result.timings,
            toc: result.toc,
            truncated: result.truncated,
        };
    }

    /// References of one type.
    pub fn references_of(&self, kind: ReferenceType) -> &[EntityRef] {
        return self.references.get(&kind).map_or(&[], Vec::as_slice);
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
    use super::*;

    #[test]
    fn references_are_unioned() {
        let mut result = RenderResult::default();
        let issue = EntityRef {
            kind: ReferenceType::Issue,
            id: 3,
        };
        result.add_reference(issue);
        result.add_reference(issue);
        assert_eq!(result.references[&ReferenceType::Issue].len(), 1);
    }

    #[test]
    fn redact_removes_empty_buckets() {
        let mut result = RenderResult::default();
        let user = EntityRef {
            kind: ReferenceType::User,
            id: 1,
        };
        result.add_reference(user);
        result.redact(&user);
        assert!(!result.has_references());
        assert!(result.references.is_empty());
    }
}
