use crate::document::{Document, NodeId};
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// Tags checkbox list items so the frontend can toggle them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskList;

impl TaskList {
    /// The list item a task checkbox belongs to, if it leads one.
    fn owning_item(doc: &Document, input: NodeId) -> Option<NodeId> {
        let parent = doc.parent(input)?;
        let item = if doc.is_element(parent, "p") { doc.parent(parent)? } else { parent };
        if !doc.is_element(item, "li") {
            return None;
        }
        let leading = doc
            .children(parent)
            .iter()
            .find(|&&c| doc.element(c).is_some() || doc.text(c).is_some_and(|t| !t.trim().is_empty()))
            .copied();
        return (leading == Some(input)).then_some(item);
    }
}

impl Filter for TaskList {
    fn name(&self) -> &'static str {
        return "task_list";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Html;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        for input in doc.elements_named("input") {
            cx.checkpoint()?;
            if doc.attr(input, "type") != Some("checkbox") {
                continue;
            }
            let Some(item) = Self::owning_item(doc, input) else {
                continue;
            };
            doc.add_class(input, "task-list-item-checkbox");
            doc.add_class(item, "task-list-item");
            if let Some(list) = doc.parent(item) {
                doc.add_class(list, "contains-task-list");
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
    use crate::context::Context;
    use crate::filters::run_filter;

    #[test]
    fn marks_items_lists_and_boxes() {
        let (html, _) = run_filter(
            &TaskList,
            "<ul><li><input disabled=\"\" type=\"checkbox\"> todo</li><li>plain</li></ul>",
            &Context::default(),
        );
        assert_eq!(
            html,
            "<ul class=\"contains-task-list\"><li class=\"task-list-item\"><input class=\"task-list-item-checkbox\" disabled=\"\" type=\"checkbox\"> todo</li><li>plain</li></ul>"
        );
    }

    #[test]
    fn checkbox_outside_list_is_ignored() {
        let html = "<p><input type=\"checkbox\"> x</p>";
        assert_eq!(run_filter(&TaskList, html, &Context::default()).0, html);
    }
}
