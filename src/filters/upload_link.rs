use crate::document::Document;
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// Points `/uploads/...` links and images at the owning project's or
/// group's upload route.
#[derive(Debug, Clone, Copy, Default)]
pub struct UploadLink;

impl UploadLink {
    /// The project-scoped URL for an `/uploads/` link.
    fn rewrite(link: &str, cx: &FilterContext<'_>) -> Option<String> {
        let rest = link.strip_prefix("/uploads/")?;
        let prefix = cx.link_prefix();
        if let Some(project) = &cx.context.project {
            return Some(format!("{prefix}/{}/uploads/{rest}", project.full_path));
        }
        let group = cx.context.group.as_ref()?;
        return Some(format!("{prefix}/groups/{}/-/uploads/{rest}", group.full_path));
    }
}

impl Filter for UploadLink {
    fn name(&self) -> &'static str {
        return "upload_link";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        for node in doc.descendants(Document::ROOT) {
            cx.checkpoint()?;
            let attr = match doc.tag(node) {
                Some("a") => "href",
                Some("img") => "src",
                _ => continue,
            };
            let rewritten = doc.attr(node, attr).and_then(|link| Self::rewrite(link, cx));
            if let Some(rewritten) = rewritten {
                doc.set_attr(node, attr, &rewritten);
                if attr == "href" {
                    doc.add_class(node, "gfm");
                }
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
    use crate::context::{Context, GroupRef, ProjectRef};
    use crate::filters::run_filter;

    #[test]
    fn project_uploads() {
        let context = Context {
            only_path: true,
            ..Context::for_project(ProjectRef {
                default_branch: "main".to_string(),
                full_path: "g/p".to_string(),
                id: 1,
                name: String::new(),
            })
        };
        let (html, _) = run_filter(&UploadLink, "<img src=\"/uploads/abc/a.png\"><a href=\"/uploads/abc/f.pdf\">f</a>", &context);
        assert_eq!(
            html,
            "<img src=\"/g/p/uploads/abc/a.png\"><a class=\"gfm\" href=\"/g/p/uploads/abc/f.pdf\">f</a>"
        );
    }

    #[test]
    fn group_uploads_are_absolute_by_default() {
        let context = Context::for_group(GroupRef {
            full_path: "g".to_string(),
            id: 2,
            name: "G".to_string(),
        });
        let (html, _) = run_filter(&UploadLink, "<a href=\"/uploads/x/f.txt\">f</a>", &context);
        assert_eq!(html, "<a class=\"gfm\" href=\"http://localhost/groups/g/-/uploads/x/f.txt\">f</a>");
    }

    #[test]
    fn rewritten_links_are_not_rewritten_again() {
        let html = "<a class=\"gfm\" href=\"/g/p/uploads/abc/f.pdf\">f</a>";
        assert_eq!(run_filter(&UploadLink, html, &Context::default()).0, html);
    }
}
