use std::collections::HashMap;
use std::sync::Mutex;

use banzai::filters::autolink::Autolink;
use banzai::filters::sanitization::{Profile, TIMEOUT_HTML};
use banzai::{
    AbilityOracle, Context, Entity, EntityRef, EntityStore, Error, Pipeline, PipelineKind, ProjectRef, ReferenceBackend,
    ReferenceType, RenderConfig, ResolutionCache, ScopePath, Services, UserRef,
};

const STORE: &str = include_str!("fixtures/site/store.toml");

fn project_context(username: &str) -> Context {
    return Context::for_project(ProjectRef {
        default_branch: "main".to_string(),
        full_path: "acme/app".to_string(),
        id: 10,
        name: "App".to_string(),
    })
    .with_user(UserRef {
        id: 3,
        username: username.to_string(),
    });
}

fn unscoped_context() -> Context {
    return Context {
        skip_project_check: true,
        ..Context::default()
    };
}

fn full() -> Pipeline {
    return Pipeline::for_kind(PipelineKind::Full, RenderConfig::default());
}

/// Records every batched lookup and resolves issue iids below 100.
#[derive(Default)]
struct Recording {
    calls: Mutex<Vec<(ReferenceType, ScopePath, Vec<String>)>>,
}

impl Recording {
    fn calls_for(&self, kind: ReferenceType) -> Vec<Vec<String>> {
        let calls = self.calls.lock().unwrap();
        return calls.iter().filter(|(k, _, _)| *k == kind).map(|(_, _, t)| t.clone()).collect();
    }
}

impl ReferenceBackend for Recording {
    fn resolve_entities(
        &self,
        kind: ReferenceType,
        scope: &ScopePath,
        tokens: &[String],
    ) -> HashMap<String, Option<Entity>> {
        let mut sorted = tokens.to_vec();
        sorted.sort();
        self.calls.lock().unwrap().push((kind, scope.clone(), sorted));

        return tokens
            .iter()
            .map(|token| {
                let entity = token.parse::<u64>().ok().filter(|&iid| kind == ReferenceType::Issue && iid < 100).map(
                    |iid| Entity {
                        assignees: Vec::new(),
                        author: None,
                        color: None,
                        confidential: false,
                        id: iid.saturating_add(1000),
                        key: token.clone(),
                        kind,
                        scope: scope.clone(),
                        scope_id: 10,
                        scope_kind: banzai::types::ScopeKind::Project,
                        title: format!("Issue {iid}"),
                    },
                );
                (token.clone(), entity)
            })
            .collect();
    }

    fn entities_by_ref(&self, _refs: &[EntityRef]) -> Vec<Entity> {
        return Vec::new();
    }
}

impl AbilityOracle for Recording {
    fn can_read_reference(&self, _user: Option<&UserRef>, _entity: &Entity) -> bool {
        return true;
    }
}

#[test]
fn bare_urls_become_links() {
    let pipeline = Pipeline::builder(PipelineKind::PlainMarkdown)
        .filter(Autolink)
        .sanitize(Profile::Broad, RenderConfig::default());
    let rendered = pipeline
        .call("See http://example.com/", &unscoped_context(), &Services::default())
        .unwrap();
    assert!(
        rendered.html.contains(r#"<a href="http://example.com/">http://example.com/</a>"#),
        "{}",
        rendered.html
    );
}

#[test]
fn full_pipeline_marks_external_links() {
    let rendered = full().call("See http://example.com/", &unscoped_context(), &Services::default()).unwrap();
    assert!(rendered.html.contains(r#"href="http://example.com/""#), "{}", rendered.html);
    assert!(rendered.html.contains(r#"rel="nofollow noreferrer noopener""#), "{}", rendered.html);
    assert!(rendered.errors.is_empty());
}

#[test]
fn preformatted_text_is_not_linked() {
    let rendered = full()
        .call("<pre>See http://example.com/</pre>", &unscoped_context(), &Services::default())
        .unwrap();
    assert!(rendered.html.contains("<pre>See http://example.com/</pre>"), "{}", rendered.html);
    assert!(!rendered.html.contains("<a"), "{}", rendered.html);
}

#[test]
fn issue_reference_links_to_the_issue() {
    let store = EntityStore::parse(STORE).unwrap();
    let services = Services::new(&store, &store);
    let rendered = full().call("Fixes #123", &project_context("eve"), &services).unwrap();

    assert!(rendered.html.contains(r#"data-issue="123""#), "{}", rendered.html);
    assert!(rendered.html.contains(r#"href="http://localhost/acme/app/-/issues/123""#), "{}", rendered.html);
    assert!(rendered.html.contains(">#123</a>"), "{}", rendered.html);
    assert_eq!(rendered.references_of(ReferenceType::Issue), &[EntityRef {
        kind: ReferenceType::Issue,
        id: 123
    }]);
}

#[test]
fn confidential_issues_are_redacted_for_outsiders() {
    let store = EntityStore::parse(STORE).unwrap();
    let services = Services::new(&store, &store);

    let outsider = full().call("See #124", &project_context("eve"), &services).unwrap();
    assert_eq!(outsider.html, "<p>See #124</p>\n");
    assert!(outsider.references_of(ReferenceType::Issue).is_empty());

    let author = full().call("See #124", &project_context("alice"), &services).unwrap();
    assert!(author.html.contains(r#"data-issue="124""#), "{}", author.html);

    let member = full().call("See #124", &project_context("carol"), &services).unwrap();
    assert!(member.html.contains(r#"data-issue="124""#), "{}", member.html);
}

#[test]
fn redaction_timeout_fails_closed() {
    let store = EntityStore::parse(STORE).unwrap();
    let services = Services::new(&store, &store);
    let mut config = RenderConfig::default();
    config.timeouts.html_ms = 0;
    let pipeline = Pipeline::for_kind(PipelineKind::Full, config);

    let rendered = pipeline.call("See #124 and #123", &project_context("mallory"), &services).unwrap();
    assert_eq!(rendered.html, "<p>See #124 and #123</p>\n");
    assert!(!rendered.html.contains("Secret plans"));
    assert!(rendered.timed_out);
    assert!(rendered.references_of(ReferenceType::Issue).is_empty());
    assert!(rendered.errors.iter().any(|e| e.filter == "redactor"));
}

#[test]
fn group_labels_render_as_chips() {
    let store = EntityStore::parse(STORE).unwrap();
    let services = Services::new(&store, &store);
    let rendered = full().call("Tagged ~bug", &project_context("eve"), &services).unwrap();

    assert!(rendered.html.contains(r#"<span class="gl-label">"#), "{}", rendered.html);
    assert!(rendered.html.contains("background-color: #d9534f"), "{}", rendered.html);
    assert!(rendered.html.contains(r#"data-group="1""#), "{}", rendered.html);
}

#[test]
fn project_shorthand_resolves_in_the_same_namespace() {
    let store = EntityStore::parse(STORE).unwrap();
    let services = Services::new(&store, &store);
    let rendered = full().call("See app~bug and app#123", &project_context("eve"), &services).unwrap();

    assert!(rendered.html.contains(r#"data-label="7""#), "{}", rendered.html);
    assert!(rendered.html.contains(r#"href="http://localhost/acme/app/-/issues/123""#), "{}", rendered.html);
    assert!(rendered.html.contains(">app#123</a>"), "{}", rendered.html);
    assert!(!rendered.html.contains(" in app"), "{}", rendered.html);
}

#[test]
fn reference_written_as_link_target_resolves_in_place() {
    let store = EntityStore::parse(STORE).unwrap();
    let services = Services::new(&store, &store);
    let rendered = full().call(r#"See <a href="~bug">Label</a>"#, &project_context("eve"), &services).unwrap();

    assert!(rendered.html.contains(r#"href="http://localhost/acme/app/-/issues?label_name=bug""#), "{}", rendered.html);
    assert!(rendered.html.contains(r#"data-label="7""#), "{}", rendered.html);
    assert!(rendered.html.contains(">Label</a></span>"), "{}", rendered.html);
    assert!(!rendered.html.contains("/-/blob/"), "{}", rendered.html);
}

#[test]
fn javascript_hrefs_are_stripped() {
    let pipeline = Pipeline::for_kind(PipelineKind::PlainMarkdown, RenderConfig::default());
    let rendered = pipeline
        .call(r#"<a href="javascript:alert(1)">x</a>"#, &Context::default(), &Services::default())
        .unwrap();
    assert!(rendered.html.contains("<a>x</a>"), "{}", rendered.html);
}

#[test]
fn duplicate_headings_get_unique_anchors() {
    let rendered = full().call("# One\n## One", &unscoped_context(), &Services::default()).unwrap();

    assert!(rendered.html.contains(r#"id="user-content-one""#), "{}", rendered.html);
    assert!(rendered.html.contains(r#"id="user-content-one-1""#), "{}", rendered.html);
    assert!(rendered.html.contains(r##"href="#one""##), "{}", rendered.html);
    assert!(rendered.html.contains(r##"href="#one-1""##), "{}", rendered.html);
}

#[test]
fn lookups_are_batched_and_memoized() {
    let backend = Recording::default();
    let services = Services::new(&backend, &backend);
    let context = project_context("eve");
    let pipeline = full();
    let mut cache = ResolutionCache::new();

    let first = pipeline
        .call_with_cache("#1 #1 #2 and #300", &context, &services, &mut cache)
        .unwrap();
    assert_eq!(backend.calls_for(ReferenceType::Issue), vec![vec![
        "1".to_string(),
        "2".to_string(),
        "300".to_string()
    ]]);
    assert_eq!(first.html.matches("data-reference-type=\"issue\"").count(), 3);
    assert!(first.html.contains("#300"), "{}", first.html);

    let second = pipeline.call_with_cache("#2 then #300", &context, &services, &mut cache).unwrap();
    assert_eq!(backend.calls_for(ReferenceType::Issue).len(), 1);
    assert_eq!(second.html.matches("<a ").count(), 1);
}

#[test]
fn missing_project_fails_before_any_filter_runs() {
    let err = full().call("#1", &Context::default(), &Services::default()).unwrap_err();
    assert!(matches!(err, Error::MissingContextKey { key: "project", .. }), "{err}");
}

#[test]
fn group_context_satisfies_project_requirement() {
    let context = Context::for_group(banzai::GroupRef {
        full_path: "acme".to_string(),
        id: 1,
        name: String::new(),
    });
    assert!(full().call("#1", &context, &Services::default()).is_ok());
}

#[test]
fn sanitizer_timeout_returns_fixed_html() {
    let mut config = RenderConfig::default();
    config.timeouts.sanitize_ms = 0;
    let pipeline = Pipeline::for_kind(PipelineKind::PlainMarkdown, config);

    let rendered = pipeline.call("**hello**", &Context::default(), &Services::default()).unwrap();
    assert_eq!(rendered.html, TIMEOUT_HTML);
    assert!(rendered.timed_out);
}

#[test]
fn single_line_drops_block_markup() {
    let pipeline = Pipeline::for_kind(PipelineKind::SingleLine, RenderConfig::default());
    let rendered = pipeline.call("# Title\n\nbody", &unscoped_context(), &Services::default()).unwrap();
    assert!(!rendered.html.contains("<h1"), "{}", rendered.html);
    assert!(rendered.html.contains("Title"), "{}", rendered.html);
}

#[test]
fn post_process_redacts_stored_html() {
    let store = EntityStore::parse(STORE).unwrap();
    let services = Services::new(&store, &store);
    let cached = r##"<p><a class="gfm gfm-issue" data-issue="124" data-original="#124" data-project="10" data-reference-type="issue" href="/acme/app/-/issues/124">#124</a></p>"##;
    let pipeline = Pipeline::for_kind(PipelineKind::PostProcess, RenderConfig::default());

    let rendered = pipeline.call(cached, &project_context("eve"), &services).unwrap();
    assert_eq!(rendered.html, "<p>#124</p>");
}
