/// Core domain types for references, entities, and scopes.
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of domain objects a reference token can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// A commit, referenced by (short) SHA.
    Commit,
    /// An issue, referenced by `#iid`.
    Issue,
    /// A label, referenced by `~name`, `~"multi word"` or `~id`.
    Label,
    /// A merge request, referenced by `!iid`.
    MergeRequest,
    /// A milestone, referenced by `%name`, `%"multi word"` or `%iid`.
    Milestone,
    /// A snippet, referenced by `$id`.
    Snippet,
    /// A user, referenced by `@username`.
    User,
}

impl ReferenceType {
    /// Every reference type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Commit,
        Self::Issue,
        Self::Label,
        Self::MergeRequest,
        Self::Milestone,
        Self::Snippet,
        Self::User,
    ];

    /// Snake-case identifier used in CSS classes and `data-reference-type`.
    pub const fn as_str(self) -> &'static str {
        return match self {
            Self::Commit => "commit",
            Self::Issue => "issue",
            Self::Label => "label",
            Self::MergeRequest => "merge_request",
            Self::Milestone => "milestone",
            Self::Snippet => "snippet",
            Self::User => "user",
        };
    }

    /// Name of the `data-*` attribute carrying the entity id.
    pub const fn data_attribute(self) -> &'static str {
        return match self {
            Self::Commit => "data-commit",
            Self::Issue => "data-issue",
            Self::Label => "data-label",
            Self::MergeRequest => "data-merge-request",
            Self::Milestone => "data-milestone",
            Self::Snippet => "data-snippet",
            Self::User => "data-user",
        };
    }

    /// Parse the `data-reference-type` attribute value back into a type.
    pub fn from_reference_type_attr(value: &str) -> Option<Self> {
        return Self::ALL.into_iter().find(|t| t.as_str() == value);
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.as_str());
    }
}

/// Full path of a project or group (`group/sub/project`). Users live in the
/// global scope, which is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopePath(
    /// The slash-separated full path.
    pub String,
);

impl ScopePath {
    /// Scope for tokens that are not qualified by any project or group.
    pub const fn global() -> Self {
        return Self(String::new());
    }

    /// Build a scope from a full path.
    pub fn new(path: impl Into<String>) -> Self {
        return Self(path.into());
    }

    /// The raw path string.
    pub fn as_str(&self) -> &str {
        return &self.0;
    }

    /// Whether this is the global (unqualified) scope.
    pub fn is_global(&self) -> bool {
        return self.0.is_empty();
    }

    /// Enclosing group paths, nearest first (`a/b/c` yields `a/b`, then `a`).
    pub fn ancestors(&self) -> impl Iterator<Item = ScopePath> + '_ {
        let mut rest = self.0.as_str();
        return std::iter::from_fn(move || {
            let (parent, _) = rest.rsplit_once('/')?;
            rest = parent;
            return Some(ScopePath::new(parent));
        });
    }

    /// The enclosing namespace, if the path has one.
    pub fn parent(&self) -> Option<ScopePath> {
        return self.ancestors().next();
    }

    /// A direct child of this namespace.
    pub fn child(&self, segment: &str) -> ScopePath {
        if self.is_global() {
            return ScopePath::new(segment);
        }
        return ScopePath::new(format!("{}/{segment}", self.0));
    }

    /// Last path segment, e.g. `app` for `acme/app`.
    pub fn name(&self) -> &str {
        return self.0.rsplit('/').next().unwrap_or_default();
    }

    /// Segments joined for display, e.g. `acme / app`.
    pub fn full_name(&self) -> String {
        return self.0.split('/').collect::<Vec<_>>().join(" / ");
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(&self.0);
    }
}

/// Resolved identity of a domain entity: its type plus an opaque id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity type.
    pub kind: ReferenceType,
    /// Opaque id, unique per type.
    pub id: u64,
}

/// Whether an entity's owning scope is a project or a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Owned by a group.
    Group,
    /// Owned by a project.
    #[default]
    Project,
}

/// Everything the pipeline needs to know about a resolved entity to link
/// and redact it. Produced by a [`crate::backend::ReferenceBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Usernames of assignees (issues and merge requests).
    #[serde(default)]
    pub assignees: Vec<String>,
    /// Username of the author, if any.
    #[serde(default)]
    pub author: Option<String>,
    /// Hex color for labels, e.g. `#428bca`.
    #[serde(default)]
    pub color: Option<String>,
    /// Confidential entities are visible only to author, assignees, members and admins.
    #[serde(default)]
    pub confidential: bool,
    /// Opaque id, unique per kind.
    pub id: u64,
    /// Identity within its scope: iid, username, label name, or full SHA.
    pub key: String,
    /// Entity type.
    pub kind: ReferenceType,
    /// Owning project or group path; empty for users.
    #[serde(default)]
    pub scope: ScopePath,
    /// Id of the owning project or group; zero for users.
    #[serde(default)]
    pub scope_id: u64,
    /// Whether the owning scope is a project or a group.
    #[serde(default)]
    pub scope_kind: ScopeKind,
    /// Human-readable title, shown in the link's `title` attribute.
    #[serde(default)]
    pub title: String,
}

impl Entity {
    /// The identity used for accumulation and redaction.
    pub const fn reference(&self) -> EntityRef {
        return EntityRef {
            kind: self.kind,
            id: self.id,
        };
    }
}

/// A raw reference found in text, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceToken {
    /// Explicit cross-scope qualifier, if the token carried one.
    pub qualifier: Option<ScopePath>,
    /// Entity type implied by the sigil.
    pub kind: ReferenceType,
    /// The exact text span as written, e.g. `group/project#12`.
    pub raw: String,
    /// Scope the token resolves against (qualifier or the current scope).
    pub scope: ScopePath,
    /// The identifying part, e.g. `12`, `bug`, `alice`.
    pub value: String,
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
    fn scope_ancestors_nearest_first() {
        let scope = ScopePath::new("a/b/c");
        let ancestors: Vec<String> = scope.ancestors().map(|s| s.0).collect();
        assert_eq!(ancestors, vec!["a/b".to_string(), "a".to_string()]);
    }

    #[test]
    fn global_scope_has_no_ancestors() {
        assert_eq!(ScopePath::global().ancestors().count(), 0);
    }

    #[test]
    fn display_names_come_from_segments() {
        let scope = ScopePath::new("acme/tools/app");
        assert_eq!(scope.name(), "app");
        assert_eq!(scope.full_name(), "acme / tools / app");
        assert_eq!(scope.parent(), Some(ScopePath::new("acme/tools")));
        assert_eq!(ScopePath::new("acme").child("app"), ScopePath::new("acme/app"));
        assert_eq!(ScopePath::new("acme").parent(), None);
    }

    #[test]
    fn reference_type_attr_round_trip() {
        for kind in ReferenceType::ALL {
            assert_eq!(ReferenceType::from_reference_type_attr(kind.as_str()), Some(kind));
        }
        assert_eq!(ReferenceType::from_reference_type_attr("epic"), None);
    }
}
