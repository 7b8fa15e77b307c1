//! Reference filters: turn `#12`, `group/app!3`, `~bug`, `@alice` and
//! friends into links.
//!
//! Every reference type runs the same three phases over the document:
//!
//! 1. collect tokens from rewritable text, grouped by the scope they
//!    resolve against (`references_per_scope`);
//! 2. resolve each scope's uncached tokens with one backend call and
//!    memoize hits and misses (`entities_per_scope`);
//! 3. replace each token that resolved with a link, leaving the rest as
//!    literal text.

mod kinds;

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

pub use kinds::DEFAULT_LABEL_COLOR;

use crate::context::{Context, ContextKey};
use crate::document::{Document, NodeId};
use crate::filter::{
    DeadlineExceeded, Filter, FilterCategory, FilterContext, IGNORE_PARENTS, glued_to_previous,
    rewritable_text_nodes, splice_text,
};
use crate::types::{Entity, EntityRef, ReferenceToken, ReferenceType, ScopeKind, ScopePath};

/// Where a batch of tokens was found.
#[derive(Debug, Clone, Copy)]
enum Site {
    /// Rewritable text; matches are spliced out into new links.
    Text(NodeId),
    /// A link whose whole `href` is one reference; it is rewritten in place.
    Href(NodeId),
}

/// Tokens found at one site, with their byte ranges.
type SiteMatches = (Site, Vec<(Range<usize>, ReferenceToken)>);

/// Order in which the pipeline runs the reference filters.
pub const ORDER: [ReferenceType; 7] = [
    ReferenceType::User,
    ReferenceType::Issue,
    ReferenceType::MergeRequest,
    ReferenceType::Snippet,
    ReferenceType::Label,
    ReferenceType::Milestone,
    ReferenceType::Commit,
];

/// One reference filter per type, in pipeline order.
pub fn reference_filters() -> Vec<ReferenceFilter> {
    return ORDER.into_iter().map(ReferenceFilter::new).collect();
}

/// Links that may carry a reference as their whole `href`: plain links
/// outside code, heading anchors and markup an earlier filter produced.
fn reference_href_candidates(doc: &Document) -> Vec<NodeId> {
    return doc
        .elements_named("a")
        .into_iter()
        .filter(|&a| {
            return doc.attr(a, "href").is_some()
                && !doc.has_class(a, "gfm")
                && !doc.has_class(a, "anchor")
                && !doc.is_inside(a, IGNORE_PARENTS)
                && !doc.has_ancestor(a, |p| doc.has_class(p, "gfm"));
        })
        .collect();
}

/// Whether `href` is exactly one sigil reference (`~bug`, `g/p#5`), which
/// the reference filters will resolve. Bare SHAs are not included, since
/// they are as likely to be file names.
pub fn is_reference_href(href: &str) -> bool {
    return ORDER.into_iter().filter(|&kind| kind != ReferenceType::Commit).any(|kind| {
        return kinds::pattern(kind).find_iter(href).any(|m| m.range() == (0..href.len()));
    });
}

/// Expand a written qualifier: a bare `project` is taken relative to
/// `namespace`, a slashed path is already full.
fn qualify(raw: &str, namespace: Option<&ScopePath>) -> ScopePath {
    if raw.contains('/') {
        return ScopePath::new(raw);
    }
    return namespace.map_or_else(|| ScopePath::new(raw), |ns| ns.child(raw));
}

/// Links references of one type.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceFilter {
    /// Type this filter links.
    kind: ReferenceType,
}

impl ReferenceFilter {
    /// A filter for `kind` references.
    pub const fn new(kind: ReferenceType) -> Self {
        return Self { kind };
    }

    /// The reference type this filter links.
    pub const fn kind(&self) -> ReferenceType {
        return self.kind;
    }

    /// Tokens in one piece of text. Unqualified tokens take the current
    /// scope and are dropped when there is none; a single-segment qualifier
    /// names a sibling in the current namespace; users always live in the
    /// global scope.
    pub fn scan(&self, text: &str, context: &Context) -> Vec<(Range<usize>, ReferenceToken)> {
        let current = context.current_scope();
        let namespace = context.current_namespace();
        let mut found = Vec::new();
        for caps in kinds::pattern(self.kind).captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if glued_to_previous(text, whole.start()) {
                continue;
            }
            let Some(value) = kinds::value(self.kind, &caps) else {
                continue;
            };
            let qualifier = caps.name("scope").map(|m| qualify(m.as_str(), namespace.as_ref()));
            let scope = if self.kind == ReferenceType::User {
                ScopePath::global()
            } else {
                let Some(scope) = qualifier.clone().or_else(|| current.clone()) else {
                    continue;
                };
                scope
            };
            found.push((whole.range(), ReferenceToken {
                qualifier,
                kind: self.kind,
                raw: whole.as_str().to_string(),
                scope,
                value,
            }));
        }
        return found;
    }

    /// Every token of this type in the document, grouped by scope.
    pub fn references_per_scope(&self, doc: &Document, context: &Context) -> BTreeMap<ScopePath, BTreeSet<String>> {
        let mut per_scope: BTreeMap<ScopePath, BTreeSet<String>> = BTreeMap::new();
        for node in rewritable_text_nodes(doc) {
            let Some(text) = doc.text(node) else {
                continue;
            };
            for (_, token) in self.scan(text, context) {
                per_scope.entry(token.scope).or_default().insert(token.value);
            }
        }
        return per_scope;
    }

    /// Resolve tokens scope by scope. Tokens already memoized cost nothing;
    /// each scope with uncached tokens costs exactly one backend call.
    ///
    /// # Errors
    ///
    /// Returns `DeadlineExceeded` if the filter's budget runs out between scopes.
    pub fn entities_per_scope(
        &self,
        per_scope: &BTreeMap<ScopePath, BTreeSet<String>>,
        cx: &mut FilterContext<'_>,
    ) -> Result<BTreeMap<ScopePath, BTreeMap<String, Option<EntityRef>>>, DeadlineExceeded> {
        let mut resolved = BTreeMap::new();
        for (scope, tokens) in per_scope {
            cx.checkpoint()?;
            let missing: Vec<String> = tokens
                .iter()
                .filter(|token| !cx.cache.contains(self.kind, scope, token))
                .cloned()
                .collect();
            if !missing.is_empty() {
                tracing::debug!(kind = %self.kind, scope = %scope, tokens = missing.len(), "resolving references");
                let mut found = cx.services.references.resolve_entities(self.kind, scope, &missing);
                cx.cache.note_backend_call();
                for token in &missing {
                    let entity = found.remove(token).flatten();
                    cx.cache.store(self.kind, scope, token, entity);
                }
            }

            let entities: BTreeMap<String, Option<EntityRef>> = tokens
                .iter()
                .map(|token| {
                    let hit = cx.cache.lookup(self.kind, scope, token).flatten().map(Entity::reference);
                    return (token.clone(), hit);
                })
                .collect();
            resolved.insert(scope.clone(), entities);
        }
        return Ok(resolved);
    }

    /// The token when `href` is nothing but one reference of this type.
    fn href_token(&self, href: &str, context: &Context) -> Option<(Range<usize>, ReferenceToken)> {
        let mut found = self.scan(href, context);
        if found.len() != 1 {
            return None;
        }
        return found.pop().filter(|(range, _)| *range == (0..href.len()));
    }

    /// Collect matches with their positions, stopping at the item limit.
    fn collect(&self, doc: &Document, cx: &mut FilterContext<'_>) -> Result<Vec<SiteMatches>, DeadlineExceeded> {
        let limit = cx.item_limit();
        let mut count = 0_usize;
        let mut limited = false;
        let mut collected = Vec::new();

        let sites = rewritable_text_nodes(doc)
            .into_iter()
            .map(Site::Text)
            .chain(reference_href_candidates(doc).into_iter().map(Site::Href));
        for site in sites {
            cx.checkpoint()?;
            let mut matches = match site {
                Site::Text(node) => doc.text(node).map(|text| self.scan(text, cx.context)).unwrap_or_default(),
                Site::Href(link) => doc
                    .attr(link, "href")
                    .and_then(|href| self.href_token(href, cx.context))
                    .into_iter()
                    .collect(),
            };
            if matches.is_empty() {
                continue;
            }
            let room = limit.saturating_sub(count);
            if matches.len() > room {
                matches.truncate(room);
                limited = true;
            }
            count = count.saturating_add(matches.len());
            if !matches.is_empty() {
                collected.push((site, matches));
            }
            if limited {
                break;
            }
        }

        if limited {
            cx.record_item_limit(self.name());
        }
        return Ok(collected);
    }

    /// Attributes of a resolved link. `original` is what redaction puts
    /// back if the viewer may not see the entity.
    fn link_attrs(
        &self,
        token: &ReferenceToken,
        entity: &Entity,
        original: &str,
        cx: &FilterContext<'_>,
    ) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("class", kinds::classes(self.kind).to_string()),
            ("data-original", original.to_string()),
            ("data-reference-type", self.kind.as_str().to_string()),
            (self.kind.data_attribute(), entity.id.to_string()),
            ("href", kinds::url(entity, &token.scope, cx)),
        ];
        if self.kind != ReferenceType::User {
            let scope_attr = match entity.scope_kind {
                ScopeKind::Group => "data-group",
                ScopeKind::Project => "data-project",
            };
            attrs.push((scope_attr, entity.scope_id.to_string()));
        }
        if !entity.title.is_empty() {
            attrs.push(("title", entity.title.clone()));
        }
        return attrs;
    }

    /// Turn a link whose `href` was a reference into a reference link,
    /// keeping the text the author wrote. Labels gain their chip wrapper.
    fn link_in_place(&self, doc: &mut Document, link: NodeId, token: &ReferenceToken, entity: &Entity, cx: &FilterContext<'_>) {
        let original = doc.text_content(link);
        for (name, value) in self.link_attrs(token, entity, &original, cx) {
            doc.set_attr(link, name, &value);
        }
        if self.kind == ReferenceType::Label {
            let wrapper = doc.create_element_with("span", &[("class", "gl-label")]);
            doc.wrap(link, wrapper);
        }
    }

    /// Build the link element for a resolved token.
    fn build_link(&self, doc: &mut Document, token: &ReferenceToken, entity: &Entity, cx: &FilterContext<'_>) -> NodeId {
        let current = cx.context.current_scope();
        let cross = token.qualifier.as_ref().filter(|q| Some(*q) != current.as_ref()).map(|q| {
            let same_namespace = q.parent() == cx.context.current_namespace();
            return kinds::scope_text(self.kind, q, same_namespace);
        });
        let attrs = self.link_attrs(token, entity, &token.raw, cx);
        let attrs: Vec<(&str, &str)> = attrs.iter().map(|(name, value)| (*name, value.as_str())).collect();
        let link = doc.create_element_with("a", &attrs);
        let text = kinds::link_text(entity, &token.raw, cross.as_deref());

        if self.kind != ReferenceType::Label {
            let text = doc.create_text(text);
            doc.append(link, text);
            return link;
        }

        let color = entity.color.as_deref().unwrap_or(DEFAULT_LABEL_COLOR);
        let style = format!("background-color: {color}");
        let chip = doc.create_element_with("span", &[("class", "gl-label-text"), ("style", &style)]);
        let name = doc.create_text(entity.title.clone());
        doc.append(chip, name);
        doc.append(link, chip);
        if let Some(suffix) = text.strip_prefix(entity.title.as_str()).filter(|s| !s.is_empty()) {
            let suffix = doc.create_text(suffix);
            doc.append(link, suffix);
        }
        let wrapper = doc.create_element_with("span", &[("class", "gl-label")]);
        doc.append(wrapper, link);
        return wrapper;
    }
}

impl Filter for ReferenceFilter {
    fn name(&self) -> &'static str {
        return kinds::filter_name(self.kind);
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Text;
    }

    fn required_keys(&self) -> &'static [ContextKey] {
        if self.kind == ReferenceType::User {
            return &[];
        }
        return &[ContextKey::Project];
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        let collected = self.collect(doc, cx)?;
        if collected.is_empty() {
            return Ok(());
        }

        let mut per_scope: BTreeMap<ScopePath, BTreeSet<String>> = BTreeMap::new();
        for (_, matches) in &collected {
            for (_, token) in matches {
                per_scope.entry(token.scope.clone()).or_default().insert(token.value.clone());
            }
        }
        self.entities_per_scope(&per_scope, cx)?;

        for (site, matches) in collected {
            cx.checkpoint()?;
            let mut replacements = Vec::new();
            for (range, token) in matches {
                let Some(Some(entity)) = cx.cache.lookup(self.kind, &token.scope, &token.value) else {
                    continue;
                };
                let entity = entity.clone();
                match site {
                    Site::Text(_) => {
                        let link = self.build_link(doc, &token, &entity, cx);
                        replacements.push((range, link));
                    },
                    Site::Href(link) => self.link_in_place(doc, link, &token, &entity, cx),
                }
                cx.result.add_reference(entity.reference());
            }
            if let Site::Text(node) = site {
                splice_text(doc, node, replacements);
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
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::{AbilityOracle, ReferenceBackend, Services};
    use crate::cache::ResolutionCache;
    use crate::config::RenderConfig;
    use crate::context::{Context, ProjectRef, UserRef};
    use crate::filters::run_filter_with;
    use crate::result::RenderResult;

    /// In-memory backend that counts batched lookups.
    #[derive(Default)]
    pub(crate) struct Fixture {
        pub(crate) calls: AtomicUsize,
        pub(crate) entities: Vec<Entity>,
    }

    impl Fixture {
        pub(crate) fn with(entities: Vec<Entity>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                entities,
            }
        }
    }

    impl ReferenceBackend for Fixture {
        fn resolve_entities(
            &self,
            kind: ReferenceType,
            scope: &ScopePath,
            tokens: &[String],
        ) -> HashMap<String, Option<Entity>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            return tokens
                .iter()
                .map(|token| {
                    let hit = self
                        .entities
                        .iter()
                        .find(|e| {
                            e.kind == kind
                                && (kind == ReferenceType::User || &e.scope == scope)
                                && (&e.key == token || e.title == *token || e.key.starts_with(token.as_str()))
                        })
                        .cloned();
                    return (token.clone(), hit);
                })
                .collect();
        }

        fn entities_by_ref(&self, refs: &[EntityRef]) -> Vec<Entity> {
            return self.entities.iter().filter(|e| refs.contains(&e.reference())).cloned().collect();
        }
    }

    impl AbilityOracle for Fixture {
        fn can_read_reference(&self, user: Option<&UserRef>, entity: &Entity) -> bool {
            return !entity.confidential
                || user.is_some_and(|u| entity.author.as_deref() == Some(u.username.as_str()));
        }
    }

    pub(crate) fn entity(kind: ReferenceType, id: u64, key: &str, scope: &str) -> Entity {
        Entity {
            assignees: Vec::new(),
            author: None,
            color: None,
            confidential: false,
            id,
            key: key.to_string(),
            kind,
            scope: ScopePath::new(scope),
            scope_id: 7,
            scope_kind: ScopeKind::Project,
            title: String::new(),
        }
    }

    pub(crate) fn project_context() -> Context {
        Context::for_project(ProjectRef {
            default_branch: "main".to_string(),
            full_path: "g/p".to_string(),
            id: 7,
            name: "P".to_string(),
        })
    }

    fn render(kind: ReferenceType, html: &str, backend: &Fixture) -> (String, RenderResult) {
        let services = Services::new(backend, backend);
        return run_filter_with(&ReferenceFilter::new(kind), html, &project_context(), &services);
    }

    #[test]
    fn issue_reference_becomes_link() {
        let backend = Fixture::with(vec![entity(ReferenceType::Issue, 501, "123", "g/p")]);
        let (html, result) = render(ReferenceType::Issue, "<p>See #123.</p>", &backend);
        assert_eq!(
            html,
            "<p>See <a class=\"gfm gfm-issue has-tooltip\" data-issue=\"501\" data-original=\"#123\" \
             data-project=\"7\" data-reference-type=\"issue\" href=\"http://localhost/g/p/-/issues/123\">#123</a>.</p>"
        );
        assert!(result.has_references());
    }

    #[test]
    fn unresolved_tokens_stay_literal() {
        let backend = Fixture::default();
        let (html, result) = render(ReferenceType::Issue, "<p>See #9</p>", &backend);
        assert_eq!(html, "<p>See #9</p>");
        assert!(!result.has_references());
    }

    #[test]
    fn tokens_in_code_and_links_are_ignored() {
        let backend = Fixture::with(vec![entity(ReferenceType::Issue, 1, "1", "g/p")]);
        let html = "<p><code>#1</code> <a href=\"/x\">#1</a> a#1</p>";
        assert_eq!(render(ReferenceType::Issue, html, &backend).0, html);
    }

    #[test]
    fn one_backend_call_per_scope() {
        let backend = Fixture::with(vec![
            entity(ReferenceType::Issue, 1, "1", "g/p"),
            entity(ReferenceType::Issue, 2, "2", "g/p"),
            entity(ReferenceType::Issue, 3, "3", "other/q"),
        ]);
        let (html, _) = render(ReferenceType::Issue, "<p>#1 #2 #1 other/q#3</p><p>#2</p>", &backend);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert!(html.contains(">other/q#3</a>"), "{html}");
        assert_eq!(html.matches("<a ").count(), 5);
    }

    #[test]
    fn memoized_across_filters_sharing_a_cache() {
        let backend = Fixture::with(vec![entity(ReferenceType::Issue, 1, "1", "g/p")]);
        let services = Services::new(&backend, &backend);
        let config = RenderConfig::default();
        let context = project_context();
        let mut result = RenderResult::default();
        let mut cache = ResolutionCache::new();
        let mut cx = FilterContext::new(&context, &config, &services, &mut result, &mut cache);
        let filter = ReferenceFilter::new(ReferenceType::Issue);

        for _ in 0..2 {
            let mut doc = Document::parse("<p>#1 and #4</p>");
            filter.call(&mut doc, &mut cx).unwrap();
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cx.cache.backend_calls(), 1);
    }

    #[test]
    fn per_scope_grouping_and_resolution() {
        let backend = Fixture::with(vec![entity(ReferenceType::MergeRequest, 5, "5", "g/p")]);
        let services = Services::new(&backend, &backend);
        let config = RenderConfig::default();
        let context = project_context();
        let mut result = RenderResult::default();
        let mut cache = ResolutionCache::new();
        let mut cx = FilterContext::new(&context, &config, &services, &mut result, &mut cache);
        let filter = ReferenceFilter::new(ReferenceType::MergeRequest);

        let doc = Document::parse("<p>!5 !6 x/y!5</p>");
        let per_scope = filter.references_per_scope(&doc, &context);
        assert_eq!(per_scope.len(), 2);
        assert_eq!(per_scope[&ScopePath::new("g/p")], BTreeSet::from(["5".to_string(), "6".to_string()]));

        let resolved = filter.entities_per_scope(&per_scope, &mut cx).unwrap();
        assert_eq!(resolved[&ScopePath::new("g/p")]["5"], Some(EntityRef { kind: ReferenceType::MergeRequest, id: 5 }));
        assert_eq!(resolved[&ScopePath::new("g/p")]["6"], None);
        assert_eq!(resolved[&ScopePath::new("x/y")]["5"], None);
    }

    #[test]
    fn labels_render_as_colored_chips() {
        let mut label = entity(ReferenceType::Label, 3, "bug", "g/p");
        label.title = "bug".to_string();
        label.color = Some("#ff0000".to_string());
        let backend = Fixture::with(vec![label]);
        let (html, _) = render(ReferenceType::Label, "<p>~bug</p>", &backend);
        assert_eq!(
            html,
            "<p><span class=\"gl-label\"><a class=\"gfm gfm-label has-tooltip gl-link gl-label-link\" \
             data-label=\"3\" data-original=\"~bug\" data-project=\"7\" data-reference-type=\"label\" \
             href=\"http://localhost/g/p/-/issues?label_name=bug\" title=\"bug\">\
             <span class=\"gl-label-text\" style=\"background-color: #ff0000\">bug</span></a></span></p>"
        );
    }

    fn titled(kind: ReferenceType, id: u64, title: &str, scope: &str) -> Entity {
        let mut entity = entity(kind, id, &id.to_string(), scope);
        entity.title = title.to_string();
        return entity;
    }

    #[test]
    fn single_segment_qualifier_is_relative_to_the_namespace() {
        let backend = Fixture::with(vec![
            titled(ReferenceType::Label, 3, "bug", "g/p"),
            titled(ReferenceType::Label, 4, "bug", "g/q"),
        ]);
        let (html, _) = render(ReferenceType::Label, "<p>See p~bug and q~bug</p>", &backend);
        assert!(html.contains("data-label=\"3\""), "{html}");
        assert!(html.contains("data-label=\"4\""), "{html}");
        assert!(html.contains("href=\"http://localhost/g/q/-/issues?label_name=bug\""), "{html}");
        assert_eq!(html.matches("</span> in q</a>").count(), 1, "{html}");
        assert!(!html.contains(" in p</a>"), "{html}");
    }

    #[test]
    fn cross_scope_text_names_sibling_or_full_path() {
        let backend = Fixture::with(vec![
            titled(ReferenceType::Label, 3, "bug", "g/q"),
            titled(ReferenceType::Label, 4, "bug", "other/r"),
            titled(ReferenceType::Milestone, 5, "v1", "g/q"),
            titled(ReferenceType::Milestone, 6, "v1", "other/r"),
        ]);
        let (labels, _) = render(ReferenceType::Label, "<p>g/q~bug other/r~bug</p>", &backend);
        assert!(labels.contains("</span> in q</a>"), "{labels}");
        assert!(labels.contains("</span> in other / r</a>"), "{labels}");

        let (milestones, _) = render(ReferenceType::Milestone, "<p>q%v1 other/r%v1</p>", &backend);
        assert!(milestones.contains(">%v1 in q</a>"), "{milestones}");
        assert!(milestones.contains(">%v1 in other/r</a>"), "{milestones}");
    }

    #[test]
    fn reference_in_link_href_keeps_link_text() {
        let backend = Fixture::with(vec![titled(ReferenceType::Label, 3, "bug", "g/p")]);
        let (html, result) = render(ReferenceType::Label, "<p>Label (<a href=\"~bug\">Label</a>.)</p>", &backend);
        assert!(html.starts_with("<p>Label (<span class=\"gl-label\"><a "), "{html}");
        assert!(html.ends_with(">Label</a></span>.)</p>"), "{html}");
        assert!(html.contains("href=\"http://localhost/g/p/-/issues?label_name=bug\""), "{html}");
        assert!(html.contains("data-label=\"3\""), "{html}");
        assert!(html.contains("data-project=\"7\""), "{html}");
        assert!(html.contains("data-original=\"Label\""), "{html}");
        assert!(result.has_references());

        let unresolved = "<p><a href=\"~nope\">x</a></p>";
        assert_eq!(render(ReferenceType::Label, unresolved, &backend).0, unresolved);

        let issues = Fixture::with(vec![entity(ReferenceType::Issue, 5, "5", "g/p")]);
        let heading = "<h1><a class=\"anchor\" href=\"#5\"></a>5</h1>";
        assert_eq!(render(ReferenceType::Issue, heading, &issues).0, heading);
    }

    #[test]
    fn cross_project_commit_uses_short_sha() {
        let sha = "0123456789abcdef0123456789abcdef01234567";
        let backend = Fixture::with(vec![entity(ReferenceType::Commit, 9, sha, "other/q")]);
        let (html, _) = render(ReferenceType::Commit, "<p>other/q@0123456789ab</p>", &backend);
        assert!(html.contains(&format!("href=\"http://localhost/other/q/-/commit/{sha}\"")), "{html}");
        assert!(html.contains(">other/q@01234567</a>"), "{html}");
    }

    #[test]
    fn users_resolve_globally_and_skip_all() {
        let backend = Fixture::with(vec![entity(ReferenceType::User, 4, "alice", "")]);
        let (html, _) = render(ReferenceType::User, "<p>@alice and @all</p>", &backend);
        assert!(html.contains("href=\"http://localhost/alice\""), "{html}");
        assert!(html.contains("class=\"gfm gfm-user js-user-link\""), "{html}");
        assert!(!html.contains("data-project"), "{html}");
        assert!(html.ends_with(" and @all</p>"), "{html}");
    }

    #[test]
    fn item_limit_leaves_the_rest_as_text() {
        let backend = Fixture::with((1..=3).map(|i| entity(ReferenceType::Issue, i, &i.to_string(), "g/p")).collect());
        let services = Services::new(&backend, &backend);
        let mut config = RenderConfig::default();
        config.limits.reference_item_limit = 2;
        let context = project_context();
        let mut result = RenderResult::default();
        let mut cache = ResolutionCache::new();
        let mut cx = FilterContext::new(&context, &config, &services, &mut result, &mut cache);
        let mut doc = Document::parse("<p>#1 #2 #3</p>");
        ReferenceFilter::new(ReferenceType::Issue).call(&mut doc, &mut cx).unwrap();
        drop(cx);

        assert_eq!(doc.to_html().matches("<a ").count(), 2);
        assert!(doc.to_html().ends_with(" #3</p>"));
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn only_path_drops_host() {
        let backend = Fixture::with(vec![entity(ReferenceType::Snippet, 2, "2", "g/p")]);
        let services = Services::new(&backend, &backend);
        let context = Context {
            only_path: true,
            ..project_context()
        };
        let (html, _) = run_filter_with(&ReferenceFilter::new(ReferenceType::Snippet), "<p>$2</p>", &context, &services);
        assert!(html.contains("href=\"/g/p/-/snippets/2\""), "{html}");
    }
}
