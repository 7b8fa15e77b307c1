//! Per-type reference syntax, URLs and link text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::context::LabelUrlMethod;
use crate::filter::FilterContext;
use crate::types::{Entity, ReferenceType, ScopeKind, ScopePath};

/// Label color when the entity carries none.
pub const DEFAULT_LABEL_COLOR: &str = "#6699cc";

/// Characters shown of a commit SHA.
const SHORT_SHA: usize = 8;

/// Optional `group/project` or same-namespace `project` qualifier in front
/// of a sigil.
macro_rules! qualified {
    ($rest:literal) => {
        concat!(r"(?:(?P<scope>[A-Za-z0-9_.\-]+(?:/[A-Za-z0-9_.\-]+)*))?", $rest)
    };
}

/// Issues: `#12`.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static ISSUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(qualified!(r"#(?P<value>\d+)\b")).expect("valid regex"));
/// Merge requests: `!3`.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static MERGE_REQUEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(qualified!(r"!(?P<value>\d+)\b")).expect("valid regex"));
/// Snippets: `$4`.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static SNIPPET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(qualified!(r"\$(?P<value>\d+)\b")).expect("valid regex"));
/// Users: `@alice`.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static USER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?P<value>[A-Za-z0-9_](?:[A-Za-z0-9_.\-]*[A-Za-z0-9_])?)").expect("valid regex")
});
/// Labels: `~12`, `~bug`, `~"two words"`.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(qualified!(
        r#"~(?:(?P<id>\d+)\b|"(?P<quoted>[^"\r\n]+)"|(?P<name>[A-Za-z0-9_\-?&]+(?:\.[A-Za-z0-9_\-?&]+)*))"#
    ))
    .expect("valid regex")
});
/// Milestones: `%12`, `%v1.0`, `%"two words"`.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static MILESTONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(qualified!(
        r#"%(?:(?P<id>\d+)\b|"(?P<quoted>[^"\r\n]+)"|(?P<name>[A-Za-z0-9_\-?&]+(?:\.[A-Za-z0-9_\-?&]+)*))"#
    ))
    .expect("valid regex")
});
/// Commits: 7 to 40 lowercase hex digits.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static COMMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?P<scope>[A-Za-z0-9_.\-]+(?:/[A-Za-z0-9_.\-]+)*)@)?(?P<value>[0-9a-f]{7,40})\b")
        .expect("valid regex")
});

/// The matcher for one reference type.
pub fn pattern(kind: ReferenceType) -> &'static Regex {
    return match kind {
        ReferenceType::Commit => &COMMIT,
        ReferenceType::Issue => &ISSUE,
        ReferenceType::Label => &LABEL,
        ReferenceType::MergeRequest => &MERGE_REQUEST,
        ReferenceType::Milestone => &MILESTONE,
        ReferenceType::Snippet => &SNIPPET,
        ReferenceType::User => &USER,
    };
}

/// Filter name for a reference type.
pub const fn filter_name(kind: ReferenceType) -> &'static str {
    return match kind {
        ReferenceType::Commit => "commit_reference",
        ReferenceType::Issue => "issue_reference",
        ReferenceType::Label => "label_reference",
        ReferenceType::MergeRequest => "merge_request_reference",
        ReferenceType::Milestone => "milestone_reference",
        ReferenceType::Snippet => "snippet_reference",
        ReferenceType::User => "user_reference",
    };
}

/// The identifying value of a match: number, name, username or SHA.
pub fn value(kind: ReferenceType, caps: &Captures<'_>) -> Option<String> {
    let value = match kind {
        ReferenceType::Label | ReferenceType::Milestone => caps
            .name("id")
            .or_else(|| caps.name("quoted"))
            .or_else(|| caps.name("name"))?
            .as_str()
            .trim()
            .to_string(),
        ReferenceType::Commit => caps.name("value")?.as_str().to_ascii_lowercase(),
        _ => caps.name("value")?.as_str().to_string(),
    };
    if value.is_empty() || (kind == ReferenceType::User && value == "all") {
        return None;
    }
    return Some(value);
}

/// CSS classes on a resolved link.
pub const fn classes(kind: ReferenceType) -> &'static str {
    return match kind {
        ReferenceType::Commit => "gfm gfm-commit has-tooltip",
        ReferenceType::Issue => "gfm gfm-issue has-tooltip",
        ReferenceType::Label => "gfm gfm-label has-tooltip gl-link gl-label-link",
        ReferenceType::MergeRequest => "gfm gfm-merge_request has-tooltip",
        ReferenceType::Milestone => "gfm gfm-milestone has-tooltip",
        ReferenceType::Snippet => "gfm gfm-snippet has-tooltip",
        ReferenceType::User => "gfm gfm-user js-user-link",
    };
}

/// Route prefix of a scope: projects sit at the root, groups under `/groups`.
fn scope_root(prefix: &str, scope: &ScopePath, kind: ScopeKind) -> String {
    return match kind {
        ScopeKind::Group => format!("{prefix}/groups/{scope}"),
        ScopeKind::Project => format!("{prefix}/{scope}"),
    };
}

/// Where a resolved link points. Labels link to the listing of the scope
/// the token was written against, filtered by the label's name.
pub fn url(entity: &Entity, token_scope: &ScopePath, cx: &FilterContext<'_>) -> String {
    let prefix = cx.link_prefix();
    let root = scope_root(prefix, &entity.scope, entity.scope_kind);
    let key = &entity.key;
    return match entity.kind {
        ReferenceType::Commit => format!("{root}/-/commit/{key}"),
        ReferenceType::Issue => format!("{root}/-/issues/{key}"),
        ReferenceType::Label => {
            let listing = match cx.context.label_url_method {
                LabelUrlMethod::Issues => "issues",
                LabelUrlMethod::MergeRequests => "merge_requests",
            };
            let is_context_group = cx.context.project.is_none()
                && cx.context.group.as_ref().is_some_and(|g| g.full_path == token_scope.as_str());
            let scope_kind = if is_context_group { ScopeKind::Group } else { ScopeKind::Project };
            let name: String = url::form_urlencoded::byte_serialize(entity.title.as_bytes()).collect();
            format!("{}/-/{listing}?label_name={name}", scope_root(prefix, token_scope, scope_kind))
        },
        ReferenceType::MergeRequest => format!("{root}/-/merge_requests/{key}"),
        ReferenceType::Milestone => format!("{root}/-/milestones/{key}"),
        ReferenceType::Snippet if entity.scope.is_global() => format!("{prefix}/-/snippets/{key}"),
        ReferenceType::Snippet => format!("{root}/-/snippets/{key}"),
        ReferenceType::User => format!("{prefix}/{key}"),
    };
}

/// How a qualifying scope is named in link text: by its own name inside
/// the current namespace, in full outside it. Labels use display names.
pub fn scope_text(kind: ReferenceType, scope: &ScopePath, same_namespace: bool) -> String {
    if same_namespace {
        return scope.name().to_string();
    }
    if kind == ReferenceType::Label {
        return scope.full_name();
    }
    return scope.as_str().to_string();
}

/// Visible text of a resolved link. `cross` names the qualifying scope
/// when the token pointed outside the current one.
pub fn link_text(entity: &Entity, raw: &str, cross: Option<&str>) -> String {
    return match (entity.kind, cross) {
        (ReferenceType::Commit, cross) => {
            let short: String = entity.key.chars().take(SHORT_SHA).collect();
            match cross {
                Some(scope) => format!("{scope}@{short}"),
                None => short,
            }
        },
        (ReferenceType::Label, Some(scope)) => format!("{} in {scope}", entity.title),
        (ReferenceType::Label, None) => entity.title.clone(),
        (ReferenceType::Milestone, Some(scope)) => format!("%{} in {scope}", entity.title),
        (ReferenceType::Milestone, None) => format!("%{}", entity.title),
        (ReferenceType::Issue | ReferenceType::MergeRequest | ReferenceType::Snippet | ReferenceType::User, _) => {
            raw.to_string()
        },
    };
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

    fn values(kind: ReferenceType, text: &str) -> Vec<(Option<String>, String)> {
        return pattern(kind)
            .captures_iter(text)
            .filter_map(|caps| {
                let scope = caps.name("scope").map(|m| m.as_str().to_string());
                return Some((scope, value(kind, &caps)?));
            })
            .collect();
    }

    #[test]
    fn issue_and_qualified_issue() {
        assert_eq!(
            values(ReferenceType::Issue, "#1 and group/app#22"),
            vec![(None, "1".to_string()), (Some("group/app".to_string()), "22".to_string())]
        );
    }

    #[test]
    fn label_forms() {
        assert_eq!(
            values(ReferenceType::Label, "~bug ~\"feature proposal\" ~123 ~g.fm."),
            vec![
                (None, "bug".to_string()),
                (None, "feature proposal".to_string()),
                (None, "123".to_string()),
                (None, "g.fm".to_string()),
            ]
        );
    }

    #[test]
    fn label_name_excludes_trailing_punctuation() {
        for trailing in [".", ",", ")", ":", ";"] {
            let text = format!("~?g.fm&{trailing}");
            assert_eq!(values(ReferenceType::Label, &text), vec![(None, "?g.fm&".to_string())], "{text}");
        }
    }

    #[test]
    fn users_skip_all_and_trailing_dot() {
        assert_eq!(values(ReferenceType::User, "@alice. @all"), vec![(None, "alice".to_string())]);
    }

    #[test]
    fn commits_are_seven_to_forty_hex() {
        assert_eq!(values(ReferenceType::Commit, "abc123 abcdef1"), vec![(None, "abcdef1".to_string())]);
        assert_eq!(
            values(ReferenceType::Commit, "g/p@ABCDEF12"),
            vec![]
        );
        assert_eq!(
            values(ReferenceType::Commit, "g/p@abcdef12"),
            vec![(Some("g/p".to_string()), "abcdef12".to_string())]
        );
    }
}
