//! Repository and wiki link rewriting for relative paths.

use crate::document::Document;
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};
use crate::filters::references::is_reference_href;

/// Collapse `.` and `..` segments of a slash-separated path without
/// touching any filesystem. `..` past the root is dropped.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                segments.pop();
            },
            other => segments.push(other),
        }
    }
    let mut out = segments.join("/");
    if path.ends_with('/') && !out.is_empty() {
        out.push('/');
    }
    return out;
}

/// Directory a requested path refers to: itself when it names a directory
/// (trailing slash or no extension), its parent otherwise.
pub fn requested_dir(requested: &str) -> &str {
    let trimmed = requested.trim_start_matches('/');
    if trimmed.ends_with('/') {
        return trimmed.trim_end_matches('/');
    }
    let (parent, last) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
    if last.contains('.') {
        return parent;
    }
    return trimmed;
}

/// Resolve `link` against the directory of `requested`, returning a
/// repository-root-relative path.
pub fn resolve_repository_path(requested: Option<&str>, link: &str) -> String {
    if let Some(rooted) = link.strip_prefix('/') {
        return normalize_path(rooted);
    }
    let dir = requested.map(requested_dir).unwrap_or("");
    if dir.is_empty() {
        return normalize_path(link);
    }
    return normalize_path(&format!("{dir}/{link}"));
}

/// Whether every `%` in `s` starts a valid two-digit escape.
fn has_valid_percent_encoding(s: &str) -> bool {
    let bytes = s.as_bytes();
    return bytes.iter().enumerate().all(|(i, &b)| {
        if b != b'%' {
            return true;
        }
        let hex = |offset: usize| {
            i.checked_add(offset)
                .and_then(|at| bytes.get(at))
                .is_some_and(u8::is_ascii_hexdigit)
        };
        return hex(1) && hex(2);
    }) && percent_encoding::percent_decode_str(s).decode_utf8().is_ok();
}

/// Whether a link target must be left untouched.
fn is_unrewritable(link: &str) -> bool {
    if link.is_empty() || link.starts_with('#') || link.starts_with("//") || link.starts_with("/uploads/") {
        return true;
    }
    let scheme_end = link.find([':', '/', '?', '#']);
    if scheme_end.is_some_and(|end| link.as_bytes().get(end) == Some(&b':')) {
        return true;
    }
    if !has_valid_percent_encoding(link) {
        return true;
    }
    return url::Url::parse("http://localhost/").and_then(|base| base.join(link)).is_err();
}

/// Whether a rooted link already points at one of `full_path`'s routes.
fn already_routed(link: &str, full_path: &str) -> bool {
    return link
        .strip_prefix('/')
        .and_then(|rest| rest.strip_prefix(full_path))
        .is_some_and(|rest| rest.starts_with("/-/"));
}

/// Split `path?query#fragment` into the path and the untouched suffix.
fn split_suffix(link: &str) -> (&str, &str) {
    let at = link.find(['?', '#']).unwrap_or(link.len());
    return link.split_at(at);
}

/// Rewrites relative `href` and `src` values into repository blob, raw and
/// tree URLs, or into wiki page URLs when rendering a wiki.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeLink;

impl RelativeLink {
    /// The routed URL for a relative link, or `None` to leave it.
    fn rewrite(link: &str, is_image: bool, cx: &FilterContext<'_>) -> Option<String> {
        if is_unrewritable(link) {
            return None;
        }
        let (path, suffix) = split_suffix(link);
        if path.is_empty() {
            return None;
        }
        let prefix = cx.link_prefix();

        if let Some(wiki) = &cx.context.wiki {
            if already_routed(path, &wiki.full_path) {
                return None;
            }
            let page = resolve_repository_path(cx.context.requested_path.as_deref(), path);
            return Some(format!("{prefix}/{}/-/wikis/{page}{suffix}", wiki.full_path));
        }

        let project = cx.context.project.as_ref()?;
        if already_routed(path, &project.full_path) {
            return None;
        }
        let git_ref = cx.context.effective_ref()?;
        let resolved = resolve_repository_path(cx.context.requested_path.as_deref(), path);
        let route = if is_image {
            "raw"
        } else if resolved.ends_with('/') || resolved.is_empty() {
            "tree"
        } else {
            "blob"
        };
        return Some(format!(
            "{prefix}/{}/-/{route}/{git_ref}/{resolved}{suffix}",
            project.full_path
        ));
    }
}

impl Filter for RelativeLink {
    fn name(&self) -> &'static str {
        return "relative_link";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        if cx.context.project.is_none() && cx.context.wiki.is_none() {
            return Ok(());
        }
        for node in doc.descendants(Document::ROOT) {
            cx.checkpoint()?;
            let (attr, is_image) = match doc.tag(node) {
                Some("a") if !doc.has_class(node, "gfm") && !doc.attr(node, "href").is_some_and(is_reference_href) => {
                    ("href", false)
                },
                Some("img") => ("src", true),
                _ => continue,
            };
            let rewritten = doc.attr(node, attr).and_then(|link| Self::rewrite(link, is_image, cx));
            if let Some(rewritten) = rewritten {
                doc.set_attr(node, attr, &rewritten);
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
    use crate::context::{Context, ProjectRef, WikiRef};
    use crate::filters::run_filter;

    fn context(requested: Option<&str>) -> Context {
        Context {
            only_path: true,
            requested_path: requested.map(str::to_string),
            ..Context::for_project(ProjectRef {
                default_branch: "main".to_string(),
                full_path: "group/app".to_string(),
                id: 1,
                name: "App".to_string(),
            })
        }
    }

    fn href(html: &str, context: &Context) -> String {
        return run_filter(&RelativeLink, html, context).0;
    }

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(normalize_path("doc/./api/../README.md"), "doc/README.md");
        assert_eq!(normalize_path("../../x"), "x");
        assert_eq!(normalize_path("a/b/"), "a/b/");
    }

    #[test]
    fn relative_to_requested_file() {
        let out = href("<a href=\"../api/README.md#usage\">x</a>", &context(Some("doc/guide/index.md")));
        assert_eq!(out, "<a href=\"/group/app/-/blob/main/doc/api/README.md#usage\">x</a>");
    }

    #[test]
    fn rooted_paths_and_images() {
        let out = href("<a href=\"/CONTRIBUTING.md\">c</a><img src=\"img/a.png\">", &context(Some("doc/")));
        assert_eq!(
            out,
            "<a href=\"/group/app/-/blob/main/CONTRIBUTING.md\">c</a><img src=\"/group/app/-/raw/main/doc/img/a.png\">"
        );
    }

    #[test]
    fn directories_use_tree() {
        let out = href("<a href=\"sub/\">d</a>", &context(None));
        assert_eq!(out, "<a href=\"/group/app/-/tree/main/sub/\">d</a>");
    }

    #[test]
    fn explicit_ref_wins() {
        let mut context = context(None);
        context.git_ref = Some("v2".to_string());
        assert_eq!(href("<a href=\"a.md\">a</a>", &context), "<a href=\"/group/app/-/blob/v2/a.md\">a</a>");
    }

    #[test]
    fn leaves_unrewritable_links_alone() {
        for link in ["https://x.test/a", "//cdn.test/a", "#top", "mailto:a@b.test", "bad%zzencoding", "%E0%A4%A", "/uploads/abc/f.png"] {
            let html = format!("<a href=\"{link}\">x</a>");
            assert_eq!(href(&html, &context(Some("doc/a.md"))), html, "{link}");
        }
    }

    #[test]
    fn rewritten_links_are_not_prefixed_twice() {
        let context = context(Some("doc/a.md"));
        let once = href("<a href=\"b.md\">b</a><img src=\"i.png\">", &context);
        assert_eq!(once, "<a href=\"/group/app/-/blob/main/doc/b.md\">b</a><img src=\"/group/app/-/raw/main/doc/i.png\">");
        assert_eq!(href(&once, &context), once);
        let wiki = Context {
            wiki: Some(WikiRef {
                full_path: "group/app".to_string(),
            }),
            ..context
        };
        let html = "<a href=\"/group/app/-/wikis/setup\">s</a>";
        assert_eq!(href(html, &wiki), html);
    }

    #[test]
    fn reference_hrefs_are_left_for_the_reference_filters() {
        for link in ["~bug", "other/app!3", "app#4", "@alice"] {
            let html = format!("<a href=\"{link}\">x</a>");
            assert_eq!(href(&html, &context(None)), html, "{link}");
        }
        assert_eq!(href("<a href=\"bug.md\">b</a>", &context(None)), "<a href=\"/group/app/-/blob/main/bug.md\">b</a>");
    }

    #[test]
    fn wiki_links() {
        let context = Context {
            wiki: Some(WikiRef {
                full_path: "group/app".to_string(),
            }),
            ..context(None)
        };
        assert_eq!(href("<a href=\"setup\">s</a>", &context), "<a href=\"/group/app/-/wikis/setup\">s</a>");
    }

    #[test]
    fn absolute_links_use_base_url() {
        let context = Context {
            only_path: false,
            ..context(None)
        };
        assert_eq!(
            href("<a href=\"a.md\">a</a>", &context),
            "<a href=\"http://localhost/group/app/-/blob/main/a.md\">a</a>"
        );
    }
}
