use std::collections::{BTreeSet, HashMap};

use crate::document::{Document, NodeId};
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};
use crate::result::RenderResult;
use crate::types::{Entity, EntityRef, ReferenceType};

/// Unlinks references the current user may not see.
///
/// Every `a[data-reference-type]` is checked against the ability oracle.
/// Entities already resolved in this run come from the cache; the rest are
/// loaded with one `entities_by_ref` call. A link whose entity is unknown
/// or unreadable is replaced by its original text and dropped from the
/// result. Surviving links are recorded as references, which lets the
/// post-process pipeline report references of cached HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redactor;

impl Redactor {
    /// The entity identity a link carries, if well formed.
    fn link_reference(doc: &Document, link: NodeId) -> Option<EntityRef> {
        let kind = ReferenceType::from_reference_type_attr(doc.attr(link, "data-reference-type")?)?;
        let id = doc.attr(link, kind.data_attribute())?.parse().ok()?;
        return Some(EntityRef { kind, id });
    }

    /// Every reference link with the identity it carries.
    fn reference_links(doc: &Document) -> Vec<(NodeId, Option<EntityRef>)> {
        return doc
            .elements_named("a")
            .into_iter()
            .filter(|&a| doc.attr(a, "data-reference-type").is_some())
            .map(|a| (a, Self::link_reference(doc, a)))
            .collect();
    }

    /// Replace a link, or the label chip around it, by its original text.
    fn unlink(doc: &mut Document, link: NodeId) {
        let original = doc
            .attr(link, "data-original")
            .map_or_else(|| doc.text_content(link), str::to_string);
        let target = doc
            .parent(link)
            .filter(|&p| doc.is_element(p, "span") && doc.has_class(p, "gl-label"))
            .unwrap_or(link);
        let text = doc.create_text(original);
        doc.replace(target, &[text]);
    }
}

impl Filter for Redactor {
    fn name(&self) -> &'static str {
        return "redactor";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        let links = Self::reference_links(doc);
        if links.is_empty() {
            return Ok(());
        }

        if cx.context.skip_redaction {
            for reference in links.iter().filter_map(|(_, r)| *r) {
                cx.result.add_reference(reference);
            }
            return Ok(());
        }

        let unknown: Vec<EntityRef> = links
            .iter()
            .filter_map(|(_, r)| *r)
            .filter(|r| cx.cache.entity(r).is_none())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !unknown.is_empty() {
            tracing::debug!(count = unknown.len(), "loading entities for redaction");
            for entity in cx.services.references.entities_by_ref(&unknown) {
                cx.cache.insert_entity(entity);
            }
            cx.checkpoint()?;
        }

        let user = cx.context.current_user.as_ref();
        let mut visible: HashMap<EntityRef, bool> = HashMap::new();
        let mut redacted = 0_usize;
        for (link, reference) in links {
            cx.checkpoint()?;
            let readable = reference.is_some_and(|r| {
                *visible.entry(r).or_insert_with(|| {
                    cx.cache
                        .entity(&r)
                        .is_some_and(|entity: &Entity| cx.services.abilities.can_read_reference(user, entity))
                })
            });
            match (reference, readable) {
                (Some(reference), true) => cx.result.add_reference(reference),
                (reference, _) => {
                    Self::unlink(doc, link);
                    if let Some(reference) = reference {
                        cx.result.redact(&reference);
                    }
                    redacted = redacted.saturating_add(1);
                },
            }
        }
        if redacted > 0 {
            tracing::debug!(redacted, "redacted references");
        }
        return Ok(());
    }

    /// Without a finished visibility check no link is known to be safe, so
    /// every reference link goes back to its original text.
    fn on_timeout(&self, doc: &mut Document, result: &mut RenderResult) {
        let links = Self::reference_links(doc);
        tracing::warn!(count = links.len(), "redaction timed out, unlinking every reference");
        for (link, reference) in links {
            Self::unlink(doc, link);
            if let Some(reference) = reference {
                result.redact(&reference);
            }
        }
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
    use crate::backend::Services;
    use crate::context::{Context, UserRef};
    use crate::filters::references::tests::{Fixture, entity, project_context};
    use crate::filters::run_filter_with;

    const CONFIDENTIAL_LINK: &str = "<p>See <a class=\"gfm gfm-issue\" data-issue=\"1\" data-original=\"#5\" \
                                     data-reference-type=\"issue\" href=\"/g/p/-/issues/5\">#5</a></p>";

    fn fixture() -> Fixture {
        let mut secret = entity(ReferenceType::Issue, 1, "5", "g/p");
        secret.confidential = true;
        secret.author = Some("alice".to_string());
        return Fixture::with(vec![secret, entity(ReferenceType::Issue, 2, "6", "g/p")]);
    }

    #[test]
    fn unreadable_links_become_original_text() {
        let backend = fixture();
        let services = Services::new(&backend, &backend);
        let (html, result) = run_filter_with(&Redactor, CONFIDENTIAL_LINK, &project_context(), &services);
        assert_eq!(html, "<p>See #5</p>");
        assert!(!result.has_references());
    }

    #[test]
    fn readable_links_are_kept_and_recorded() {
        let backend = fixture();
        let services = Services::new(&backend, &backend);
        let context = project_context().with_user(UserRef {
            id: 1,
            username: "alice".to_string(),
        });
        let (html, result) = run_filter_with(&Redactor, CONFIDENTIAL_LINK, &context, &services);
        assert_eq!(html, CONFIDENTIAL_LINK);
        assert_eq!(result.references[&ReferenceType::Issue].len(), 1);
    }

    #[test]
    fn unknown_entities_are_redacted() {
        let backend = Fixture::default();
        let services = Services::new(&backend, &backend);
        let html = "<p><span class=\"gl-label\"><a data-label=\"9\" data-original=\"~gone\" \
                    data-reference-type=\"label\" href=\"/x\"><span>gone</span></a></span></p>";
        let (out, _) = run_filter_with(&Redactor, html, &project_context(), &services);
        assert_eq!(out, "<p>~gone</p>");
    }

    #[test]
    fn skip_redaction_keeps_everything() {
        let backend = fixture();
        let services = Services::new(&backend, &backend);
        let context = Context {
            skip_redaction: true,
            ..project_context()
        };
        let (html, result) = run_filter_with(&Redactor, CONFIDENTIAL_LINK, &context, &services);
        assert_eq!(html, CONFIDENTIAL_LINK);
        assert!(result.has_references());
    }

    #[test]
    fn timeout_unlinks_every_reference() {
        let mut doc = Document::parse(CONFIDENTIAL_LINK);
        let mut result = RenderResult::default();
        result.add_reference(EntityRef { kind: ReferenceType::Issue, id: 1 });

        Redactor.on_timeout(&mut doc, &mut result);
        assert_eq!(doc.to_html(), "<p>See #5</p>");
        assert!(!result.has_references());
    }

    #[test]
    fn plain_links_are_ignored() {
        let html = "<p><a href=\"/x\">x</a></p>";
        assert_eq!(run_filter_with(&Redactor, html, &Context::default(), &Services::default()).0, html);
    }
}
