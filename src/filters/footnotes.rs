use std::collections::HashMap;

use crate::document::{Document, NodeId};
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};
use crate::hasher;

/// Rewrites converter footnotes into a `section.footnotes` list with
/// stable `fn-N-<hash>` / `fnref-N-<hash>` ids and back-references.
#[derive(Debug, Clone, Copy, Default)]
pub struct Footnotes;

impl Footnotes {
    /// Footnote reference anchors: `sup.footnote-reference > a[href^="#"]`.
    fn references(doc: &Document) -> Vec<(NodeId, String)> {
        return doc
            .elements_named("a")
            .into_iter()
            .filter(|&a| doc.parent(a).is_some_and(|sup| doc.has_class(sup, "footnote-reference")))
            .filter_map(|a| {
                let label = doc.attr(a, "href")?.strip_prefix('#')?.to_string();
                return Some((a, label));
            })
            .collect();
    }

    /// Footnote bodies: `div.footnote-definition[id]`.
    fn definitions(doc: &Document) -> Vec<(NodeId, String)> {
        return doc
            .elements_named("div")
            .into_iter()
            .filter(|&div| doc.has_class(div, "footnote-definition"))
            .filter_map(|div| Some((div, doc.attr(div, "id")?.to_string())))
            .collect();
    }

    /// The `<li>` for one definition, with a back-reference link.
    fn build_item(doc: &mut Document, definition: NodeId, number: usize, suffix: &str) -> NodeId {
        let item = doc.create_element_with("li", &[("id", &format!("fn-{number}-{suffix}"))]);
        for child in doc.children(definition).to_vec() {
            let is_label = doc.has_class(child, "footnote-definition-label");
            let is_blank = doc.text(child).is_some_and(|t| t.trim().is_empty());
            if !is_label && !is_blank {
                doc.append(item, child);
            }
        }

        let backref = doc.create_element_with("a", &[
            ("aria-label", &format!("Back to reference {number}")),
            ("class", "footnote-backref"),
            ("data-footnote-backref", ""),
            ("href", &format!("#fnref-{number}-{suffix}")),
        ]);
        let arrow = doc.create_text("↩");
        doc.append(backref, arrow);

        let host = doc
            .children(item)
            .last()
            .copied()
            .filter(|&last| doc.is_element(last, "p"))
            .unwrap_or(item);
        if host != item {
            let space = doc.create_text(" ");
            doc.append(host, space);
        }
        doc.append(host, backref);
        return item;
    }
}

impl Filter for Footnotes {
    fn name(&self) -> &'static str {
        return "footnotes";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        let references = Self::references(doc);
        let definitions = Self::definitions(doc);
        if references.is_empty() && definitions.is_empty() {
            return Ok(());
        }
        let suffix = hasher::content_suffix(&doc.text_content(Document::ROOT));

        let mut numbers: HashMap<String, usize> = HashMap::new();
        let mut seen: HashMap<usize, usize> = HashMap::new();
        for (anchor, label) in &references {
            cx.checkpoint()?;
            let next = numbers.len().saturating_add(1);
            let number = *numbers.entry(label.clone()).or_insert(next);
            let occurrence = seen.entry(number).or_insert(0);
            *occurrence = occurrence.saturating_add(1);

            let id = match *occurrence {
                1 => format!("fnref-{number}-{suffix}"),
                n => format!("fnref-{number}-{suffix}-{n}"),
            };
            doc.set_attr(*anchor, "href", &format!("#fn-{number}-{suffix}"));
            doc.set_attr(*anchor, "id", &id);
            doc.set_attr(*anchor, "data-footnote-ref", "");
            if let Some(sup) = doc.parent(*anchor) {
                doc.set_attr(sup, "class", "footnote-ref");
            }
        }

        let mut items: Vec<(usize, NodeId)> = Vec::new();
        for (definition, label) in definitions {
            cx.checkpoint()?;
            let next = numbers.len().saturating_add(1);
            let number = *numbers.entry(label).or_insert(next);
            items.push((number, Self::build_item(doc, definition, number, &suffix)));
            doc.detach(definition);
        }
        if items.is_empty() {
            return Ok(());
        }
        items.sort_by_key(|&(number, _)| number);

        let section = doc.create_element_with("section", &[("class", "footnotes"), ("data-footnotes", "")]);
        let list = doc.create_element("ol");
        doc.append(section, list);
        for (_, item) in items {
            doc.append(list, item);
        }
        doc.append(Document::ROOT, section);
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
    use crate::backend::MarkdownConverter as _;
    use crate::context::{Context, MarkdownEngine};
    use crate::filters::run_filter;
    use crate::markdown::CommonMark;

    fn converted(markdown: &str) -> String {
        return CommonMark.convert(markdown, MarkdownEngine::Default).to_html();
    }

    #[test]
    fn builds_footnote_section_with_stable_ids() {
        let input = converted("Text[^note].\n\n[^note]: The note.\n");
        let (html, _) = run_filter(&Footnotes, &input, &Context::default());
        let suffix = hasher::content_suffix(&crate::document::Document::parse(&input).text_content(Document::ROOT));

        assert!(html.contains(&format!("<sup class=\"footnote-ref\"><a data-footnote-ref=\"\" href=\"#fn-1-{suffix}\" id=\"fnref-1-{suffix}\">1</a></sup>")), "{html}");
        assert!(html.contains(&format!("<section class=\"footnotes\" data-footnotes=\"\"><ol><li id=\"fn-1-{suffix}\"><p>The note. <a aria-label=\"Back to reference 1\" class=\"footnote-backref\" data-footnote-backref=\"\" href=\"#fnref-1-{suffix}\">↩</a></p></li></ol></section>")), "{html}");
        assert!(!html.contains("footnote-definition"), "{html}");
    }

    #[test]
    fn same_input_same_ids() {
        let input = converted("A[^1]\n\n[^1]: one\n");
        assert_eq!(
            run_filter(&Footnotes, &input, &Context::default()).0,
            run_filter(&Footnotes, &input, &Context::default()).0
        );
    }

    #[test]
    fn documents_without_footnotes_are_untouched() {
        let html = "<p>plain <sup>2</sup></p>";
        assert_eq!(run_filter(&Footnotes, html, &Context::default()).0, html);
    }
}
