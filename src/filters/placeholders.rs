use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::document::Document;
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// `%{name}` placeholders.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\{([a-z_]+)\}").expect("valid regex"));

/// Expands `%{name}` placeholders in text, link targets and image sources
/// from the rendering context. Unknown names, or names whose value the
/// context lacks, are left as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct Placeholders;

impl Placeholders {
    /// The context value a placeholder name stands for.
    fn value(name: &str, cx: &FilterContext<'_>) -> Option<String> {
        let project = cx.context.project.as_ref();
        return match name {
            "default_branch" => project.map(|p| p.default_branch.clone()),
            "gitlab_server" => url::Url::parse(&cx.config.base_url).ok().and_then(|u| {
                let host = u.host_str()?.to_string();
                return Some(match u.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host,
                });
            }),
            "group_name" => cx.context.group.as_ref().map(|g| g.name.clone()).or_else(|| {
                let (namespace, _) = project?.full_path.rsplit_once('/')?;
                return namespace.rsplit('/').next().map(str::to_string);
            }),
            "project_id" => project.map(|p| p.id.to_string()),
            "project_name" => project.map(|p| p.name.clone()),
            "project_namespace" => project
                .and_then(|p| p.full_path.rsplit_once('/'))
                .map(|(namespace, _)| namespace.to_string()),
            "project_path" => project.map(|p| p.full_path.clone()),
            _ => None,
        };
    }

    /// Expand every known placeholder in `text`.
    fn expand<'t>(text: &'t str, cx: &FilterContext<'_>) -> Cow<'t, str> {
        return PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let name = caps.get(1).map_or("", |m| m.as_str());
            return Self::value(name, cx).unwrap_or_else(|| whole.to_string());
        });
    }
}

impl Filter for Placeholders {
    fn name(&self) -> &'static str {
        return "placeholders";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Text;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        if cx.context.disable_placeholders {
            return Ok(());
        }
        for node in doc.descendants(Document::ROOT) {
            cx.checkpoint()?;
            if doc.text(node).is_some() {
                if doc.is_inside(node, &["code", "pre"]) {
                    continue;
                }
                let expanded = doc.text(node).and_then(|text| match Self::expand(text, cx) {
                    Cow::Owned(expanded) => Some(expanded),
                    Cow::Borrowed(_) => None,
                });
                if let Some(expanded) = expanded {
                    doc.set_text(node, expanded);
                }
                continue;
            }
            let attr = match doc.tag(node) {
                Some("a") => "href",
                Some("img") => "src",
                _ => continue,
            };
            let expanded = doc.attr(node, attr).and_then(|value| match Self::expand(value, cx) {
                Cow::Owned(expanded) => Some(expanded),
                Cow::Borrowed(_) => None,
            });
            if let Some(expanded) = expanded {
                doc.set_attr(node, attr, &expanded);
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
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::context::{Context, ProjectRef};
    use crate::filters::run_filter;

    fn context() -> Context {
        Context::for_project(ProjectRef {
            default_branch: "main".to_string(),
            full_path: "org/team/app".to_string(),
            id: 42,
            name: "App".to_string(),
        })
    }

    #[test]
    fn expands_text_and_links() {
        let (html, _) = run_filter(
            &Placeholders,
            "<p>%{project_name} on %{default_branch} <a href=\"/%{project_path}/-/tree\">t</a></p>",
            &context(),
        );
        assert_eq!(html, "<p>App on main <a href=\"/org/team/app/-/tree\">t</a></p>");
    }

    #[test]
    fn namespace_group_and_server() {
        let (html, _) = run_filter(
            &Placeholders,
            "<p>%{project_namespace} %{group_name} %{gitlab_server} %{project_id}</p>",
            &context(),
        );
        assert_eq!(html, "<p>org/team team localhost 42</p>");
    }

    #[test]
    fn unknown_and_disabled_are_left_alone() {
        let (html, _) = run_filter(&Placeholders, "<p>%{nope} <code>%{project_name}</code></p>", &context());
        assert_eq!(html, "<p>%{nope} <code>%{project_name}</code></p>");

        let disabled = Context {
            disable_placeholders: true,
            ..context()
        };
        let (html, _) = run_filter(&Placeholders, "<p>%{project_name}</p>", &disabled);
        assert_eq!(html, "<p>%{project_name}</p>");
    }
}
