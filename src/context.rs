//! Caller-supplied rendering options.

use std::path::Path;

use serde::Deserialize;

use crate::error::Error;
use crate::types::ScopePath;

/// The project a document belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectRef {
    /// Branch used for repository links when no `ref` is given.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Full path, e.g. `gitlab-org/gitlab`.
    pub full_path: String,
    /// Database id, emitted as `data-project`.
    pub id: u64,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// The group a document belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupRef {
    /// Full path, e.g. `gitlab-org`.
    pub full_path: String,
    /// Database id, emitted as `data-group`.
    pub id: u64,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// The viewer the document is rendered for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRef {
    /// Database id.
    pub id: u64,
    /// Login name.
    pub username: String,
}

/// A wiki whose pages relative links point into.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WikiRef {
    /// Full path of the wiki's container (project or group).
    pub full_path: String,
}

/// Which markdown dialect the converter parses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkdownEngine {
    /// Strict CommonMark, no extensions.
    Alternate,
    /// CommonMark plus tables, footnotes, strikethrough and task lists.
    #[default]
    Default,
}

/// Which listing label links point at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelUrlMethod {
    /// The issue list filtered by label.
    #[default]
    Issues,
    /// The merge request list filtered by label.
    MergeRequests,
}

/// A context key a filter can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKey {
    /// A current user.
    CurrentUser,
    /// A project; satisfied by a group or `skip_project_check` as well.
    Project,
}

impl ContextKey {
    /// Key name as used in error messages.
    pub const fn name(self) -> &'static str {
        return match self {
            Self::CurrentUser => "current_user",
            Self::Project => "project",
        };
    }
}

/// Caller configuration for one pipeline run. Read-only once the run starts.
/// The set of options is closed: unknown keys fail deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Context {
    /// Host serving static assets; links to it are not treated as external.
    pub asset_host: Option<String>,
    /// Path prefix for emoji fallback images.
    pub asset_root: Option<String>,
    /// The viewer.
    pub current_user: Option<UserRef>,
    /// Leave `%{...}` placeholders untouched.
    pub disable_placeholders: bool,
    /// Git ref for repository links; defaults to the project's default branch.
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    /// Owning group.
    pub group: Option<GroupRef>,
    /// Where label links point.
    pub label_url_method: LabelUrlMethod,
    /// Generic byte limit applied to the source before rendering.
    pub limit: Option<usize>,
    /// Markdown dialect.
    pub markdown_engine: MarkdownEngine,
    /// Cap on include directives; defaults to the configured limit.
    pub max_includes: Option<usize>,
    /// Skip heading anchors.
    pub no_header_anchors: bool,
    /// Emit root-relative internal links instead of absolute URLs.
    pub only_path: bool,
    /// Owning project.
    pub project: Option<ProjectRef>,
    /// Repository path of the file being rendered.
    pub requested_path: Option<String>,
    /// Allow reference filters to run without a project or group.
    pub skip_project_check: bool,
    /// Skip the redaction pass. For trusted internal rendering only.
    pub skip_redaction: bool,
    /// Cut visible text to this many characters after rendering.
    pub truncate_visible_max_chars: Option<usize>,
    /// Wiki the document belongs to.
    pub wiki: Option<WikiRef>,
}

impl Context {
    /// A context scoped to `project`.
    pub fn for_project(project: ProjectRef) -> Self {
        return Self {
            project: Some(project),
            ..Self::default()
        };
    }

    /// A context scoped to `group`.
    pub fn for_group(group: GroupRef) -> Self {
        return Self {
            group: Some(group),
            ..Self::default()
        };
    }

    /// Set the viewer.
    #[must_use]
    pub fn with_user(mut self, user: UserRef) -> Self {
        self.current_user = Some(user);
        return self;
    }

    /// Whether `key` is satisfied.
    pub const fn provides(&self, key: ContextKey) -> bool {
        return match key {
            ContextKey::CurrentUser => self.current_user.is_some(),
            ContextKey::Project => {
                self.project.is_some() || self.group.is_some() || self.skip_project_check
            },
        };
    }

    /// Scope unqualified references resolve against: the project, else the group.
    pub fn current_scope(&self) -> Option<ScopePath> {
        if let Some(project) = &self.project {
            return Some(ScopePath::new(project.full_path.clone()));
        }
        return self.group.as_ref().map(|g| ScopePath::new(g.full_path.clone()));
    }

    /// Namespace that single-segment qualifiers (`app#1`) are relative to:
    /// the project's parent, else the group itself.
    pub fn current_namespace(&self) -> Option<ScopePath> {
        if let Some(project) = &self.project {
            return ScopePath::new(project.full_path.clone()).parent();
        }
        return self.group.as_ref().map(|g| ScopePath::new(g.full_path.clone()));
    }

    /// The git ref repository links use.
    pub fn effective_ref(&self) -> Option<&str> {
        if let Some(r) = self.git_ref.as_deref().filter(|r| !r.is_empty()) {
            return Some(r);
        }
        return self.project.as_ref().map(|p| p.default_branch.as_str());
    }

    /// Parse a context from TOML.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` on malformed TOML or unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        return Ok(toml::from_str(content)?);
    }

    /// Read a context file, which must exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if the file is missing, `Error::Io` for
    /// other read failures, or the errors of [`Self::parse`].
    pub fn read(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(&content);
    }
}

/// Branch assumed when a project omits `default_branch`.
fn default_branch() -> String {
    return "master".to_string();
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

    fn project() -> ProjectRef {
        ProjectRef {
            default_branch: "main".to_string(),
            full_path: "group/project".to_string(),
            id: 7,
            name: "Project".to_string(),
        }
    }

    #[test]
    fn project_key_satisfied_by_group_or_skip() {
        assert!(!Context::default().provides(ContextKey::Project));
        assert!(Context::for_project(project()).provides(ContextKey::Project));
        let group = GroupRef {
            full_path: "group".to_string(),
            id: 1,
            name: "Group".to_string(),
        };
        assert!(Context::for_group(group).provides(ContextKey::Project));
        let skip = Context {
            skip_project_check: true,
            ..Context::default()
        };
        assert!(skip.provides(ContextKey::Project));
    }

    #[test]
    fn namespace_is_project_parent_or_group() {
        assert_eq!(Context::for_project(project()).current_namespace(), Some(ScopePath::new("group")));
        let group = GroupRef {
            full_path: "group/sub".to_string(),
            id: 1,
            name: "Sub".to_string(),
        };
        assert_eq!(Context::for_group(group).current_namespace(), Some(ScopePath::new("group/sub")));
        assert_eq!(Context::default().current_namespace(), None);
    }

    #[test]
    fn effective_ref_prefers_explicit_ref() {
        let mut context = Context::for_project(project());
        assert_eq!(context.effective_ref(), Some("main"));
        context.git_ref = Some("feature".to_string());
        assert_eq!(context.effective_ref(), Some("feature"));
    }

    #[test]
    fn deserializes_ref_key_and_rejects_unknown() {
        let context: Context = toml::from_str(
            "only_path = true\nref = \"v1\"\n[project]\nid = 1\nfull_path = \"a/b\"\n",
        )
        .unwrap();
        assert!(context.only_path);
        assert_eq!(context.git_ref.as_deref(), Some("v1"));
        assert_eq!(context.project.unwrap().default_branch, "master");
        assert!(toml::from_str::<Context>("projcet = 1\n").is_err());
    }
}
