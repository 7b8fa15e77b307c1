//! Heading anchors plus the `[[_TOC_]]` / `[TOC]` table of contents.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::document::{Document, NodeId};
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// Heading elements, outermost first.
const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Paragraph texts, lowercased, that request a table of contents.
const TOC_TAGS: &[&str] = &["[[_toc_]]", "[[toc]]", "[toc]"];

/// Characters dropped from slugs.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static NOT_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\- ]").expect("valid regex"));
/// Whitespace runs.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
/// Repeated hyphens.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static DASHES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("valid regex"));

/// Anchor slug for heading text: lowercase, punctuation removed, whitespace
/// runs turned into single hyphens. Unicode letters are kept.
pub fn slugify(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let stripped = NOT_SLUG.replace_all(&lower, "");
    let hyphened = SPACES.replace_all(stripped.trim(), "-");
    let slug = DASHES.replace_all(&hyphened, "-").into_owned();
    if slug.is_empty() {
        return "anchor".to_string();
    }
    return slug;
}

/// Hands out unique slugs: `base`, `base-1`, `base-2`, ..., skipping any
/// suffixed form an earlier heading already took as its own base.
#[derive(Debug, Default)]
struct SlugCounter {
    /// Every slug handed out so far.
    issued: HashSet<String>,
    /// Next suffix to try per base.
    next_suffix: HashMap<String, usize>,
}

impl SlugCounter {
    /// The first unused form of `base`.
    fn unique(&mut self, base: String) -> String {
        let mut slug = base.clone();
        if self.issued.contains(&slug) {
            let suffix = self.next_suffix.entry(base.clone()).or_insert(1);
            loop {
                slug = format!("{base}-{suffix}");
                *suffix = suffix.saturating_add(1);
                if !self.issued.contains(&slug) {
                    break;
                }
            }
        }
        self.issued.insert(slug.clone());
        return slug;
    }
}

/// A heading seen while anchoring.
#[derive(Debug)]
struct Heading {
    /// 1 for `h1` through 6 for `h6`.
    level: usize,
    /// Anchor slug.
    slug: String,
    /// Visible text.
    text: String,
}

/// Adds an anchor to every heading and replaces TOC tags with a nested list.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableOfContents;

impl TableOfContents {
    /// Heading level from the tag name.
    fn level(name: &str) -> usize {
        return HEADINGS.iter().position(|h| *h == name).map_or(1, |i| i.saturating_add(1));
    }

    /// Build `<ul class="section-nav">` with one nested list per level step.
    fn build_nav(doc: &mut Document, headings: &[Heading]) -> NodeId {
        let root = doc.create_element_with("ul", &[("class", "section-nav")]);
        let mut stack: Vec<(usize, NodeId)> = Vec::new();
        let mut last_item: Option<NodeId> = None;
        let base_level = headings.iter().map(|h| h.level).min().unwrap_or(1);

        for heading in headings {
            while stack.last().is_some_and(|&(level, _)| level > heading.level) {
                stack.pop();
            }
            let list = match stack.last() {
                Some(&(level, list)) if level == heading.level => list,
                _ => {
                    let list = match (last_item, stack.is_empty() && heading.level <= base_level) {
                        (Some(parent), false) => {
                            let nested = doc.create_element("ul");
                            doc.append(parent, nested);
                            nested
                        },
                        _ => root,
                    };
                    stack.push((heading.level, list));
                    list
                },
            };

            let item = doc.create_element("li");
            let link = doc.create_element_with("a", &[("href", &format!("#{}", heading.slug))]);
            let text = doc.create_text(heading.text.as_str());
            doc.append(link, text);
            doc.append(item, link);
            doc.append(list, item);
            last_item = Some(item);
        }
        return root;
    }

    /// Paragraphs consisting of a TOC tag.
    fn toc_tags(doc: &Document) -> Vec<NodeId> {
        return doc
            .elements_named("p")
            .into_iter()
            .filter(|&p| {
                let text = doc.text_content(p).trim().to_lowercase();
                return TOC_TAGS.contains(&text.as_str());
            })
            .collect();
    }
}

impl Filter for TableOfContents {
    fn name(&self) -> &'static str {
        return "table_of_contents";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        if cx.context.no_header_anchors {
            return Ok(());
        }

        let mut slugs = SlugCounter::default();
        let mut headings = Vec::new();
        for node in doc.descendants(Document::ROOT) {
            cx.checkpoint()?;
            let Some(name) = doc.tag(node).filter(|t| HEADINGS.contains(t)) else {
                continue;
            };
            let level = Self::level(name);
            let text = doc.text_content(node).trim().to_string();
            let slug = slugs.unique(slugify(&text));

            let already_anchored = doc
                .first_child(node)
                .is_some_and(|c| doc.is_element(c, "a") && doc.has_class(c, "anchor"));
            if !already_anchored {
                let anchor = doc.create_element_with("a", &[
                    ("aria-hidden", "true"),
                    ("class", "anchor"),
                    ("href", &format!("#{slug}")),
                    ("id", &format!("user-content-{slug}")),
                ]);
                doc.prepend(node, anchor);
            }
            headings.push(Heading { level, slug, text });
        }

        if headings.is_empty() {
            return Ok(());
        }

        let nav = Self::build_nav(doc, &headings);
        cx.result.toc = Some(doc.outer_html(nav));
        let tags = Self::toc_tags(doc);
        if tags.is_empty() {
            return Ok(());
        }
        let source = doc.clone();
        for tag in tags {
            let copy = doc.import(&source, nav);
            doc.replace(tag, &[copy]);
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
    use crate::context::Context;
    use crate::filters::run_filter;

    #[test]
    fn slugs_normalize_text() {
        assert_eq!(slugify("Getting Started!"), "getting-started");
        assert_eq!(slugify("  a -- b  "), "a-b");
        assert_eq!(slugify("Ünïcödé héading"), "ünïcödé-héading");
        assert_eq!(slugify("???"), "anchor");
    }

    #[test]
    fn duplicate_headings_get_numbered_anchors() {
        let (html, _) = run_filter(&TableOfContents, "<h1>One</h1><h2>One</h2><h3>One</h3>", &Context::default());
        assert!(html.contains("href=\"#one\" id=\"user-content-one\""), "{html}");
        assert!(html.contains("href=\"#one-1\" id=\"user-content-one-1\""), "{html}");
        assert!(html.contains("href=\"#one-2\" id=\"user-content-one-2\""), "{html}");
    }

    #[test]
    fn suffixed_heading_text_does_not_collide() {
        let (html, _) = run_filter(&TableOfContents, "<h1>One</h1><h1>One 1</h1><h1>One</h1><h1>One</h1>", &Context::default());
        for slug in ["one", "one-1", "one-2", "one-3"] {
            assert_eq!(html.matches(&format!("id=\"user-content-{slug}\"")).count(), 1, "{slug}: {html}");
        }

        let mut slugs = SlugCounter::default();
        let issued: Vec<String> = ["one", "one", "one-1"].into_iter().map(|b| slugs.unique(b.to_string())).collect();
        assert_eq!(issued, vec!["one", "one-1", "one-1-1"]);
    }

    #[test]
    fn toc_tag_is_replaced_and_side_artifact_set() {
        let (html, result) = run_filter(
            &TableOfContents,
            "<p>[[_TOC_]]</p><h1>A</h1><h2>B</h2><h1>C</h1>",
            &Context::default(),
        );
        let toc = result.toc.unwrap();
        assert_eq!(
            toc,
            "<ul class=\"section-nav\"><li><a href=\"#a\">A</a><ul><li><a href=\"#b\">B</a></li></ul></li><li><a href=\"#c\">C</a></li></ul>"
        );
        assert!(html.starts_with(&toc), "{html}");
    }

    #[test]
    fn no_header_anchors_disables_everything() {
        let context = Context {
            no_header_anchors: true,
            ..Context::default()
        };
        let (html, result) = run_filter(&TableOfContents, "<h1>A</h1>", &context);
        assert_eq!(html, "<h1>A</h1>");
        assert!(result.toc.is_none());
    }

    #[test]
    fn rerun_keeps_single_anchor() {
        let (once, _) = run_filter(&TableOfContents, "<h1>A</h1>", &Context::default());
        let (twice, _) = run_filter(&TableOfContents, &once, &Context::default());
        assert_eq!(once, twice);
    }
}
