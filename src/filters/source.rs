//! Hooks that run on the raw source text before conversion.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::backend::Services;
use crate::context::Context;
use crate::error::{FilterError, FilterErrorKind};
use crate::filters::relative_link::resolve_repository_path;
use crate::result::RenderResult;

/// Appended to an include cut at the size limit.
const ELLIPSIS: &str = "...";

/// `::include{file=path}` on a line of its own.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^::include\{file=([^}\r\n]+)\}[ \t]*$").expect("valid regex")
});

/// Largest prefix of `text` no longer than `limit` bytes that ends on a
/// character boundary.
pub fn floor_char_boundary(text: &str, limit: usize) -> &str {
    if limit >= text.len() {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    return text.get(..end).unwrap_or("");
}

/// Cut `text` to `limit` bytes on a character boundary and append an
/// ellipsis. Input that already fits is returned unchanged.
pub fn truncate_source(text: &str, limit: usize, result: &mut RenderResult) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    tracing::debug!(bytes = text.len(), limit, "truncating source");
    result.truncated = true;
    let mut out = floor_char_boundary(text, limit).to_string();
    out.push_str(ELLIPSIS);
    return out;
}

/// Expand `::include{file=PATH}` lines from the project repository.
///
/// Paths resolve like relative links against `requested_path`. Without a
/// project or a blob source the directives stay literal. At most
/// `max_includes` directives are expanded; later ones stay literal and an
/// `IncludeLimit` error is recorded. Unreadable files become an error line.
pub fn expand_includes(
    text: &str,
    context: &Context,
    services: &Services<'_>,
    max_includes: usize,
    result: &mut RenderResult,
) -> String {
    let (Some(project), Some(blobs)) = (&context.project, services.blobs) else {
        return text.to_string();
    };
    let Some(git_ref) = context.effective_ref() else {
        return text.to_string();
    };

    let mut expanded = 0_usize;
    let mut limited = false;
    let out = INCLUDE.replace_all(text, |caps: &Captures<'_>| {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let raw_path = caps.get(1).map_or("", |m| m.as_str().trim());

        if expanded >= max_includes {
            limited = true;
            return whole.to_string();
        }
        expanded = expanded.saturating_add(1);

        let path = resolve_repository_path(context.requested_path.as_deref(), raw_path);
        if let Some(contents) = blobs.read_blob(project, git_ref, &path) {
            return contents.trim_end_matches('\n').to_string();
        }
        tracing::warn!(path = %path, "include target unreadable");
        result.record(FilterError::new(
            "include",
            FilterErrorKind::IncludeFailed,
            format!("could not read `{path}`"),
        ));
        return format!("**Error** including `{raw_path}`: file not found");
    });

    if limited {
        result.record(FilterError::new(
            "include",
            FilterErrorKind::IncludeLimit,
            format!("expanded the first {max_includes} include directives"),
        ));
    }
    return out.into_owned();
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
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::{BlobSource, NullBackend};
    use crate::context::ProjectRef;

    struct Files(HashMap<&'static str, &'static str>);

    impl BlobSource for Files {
        fn read_blob(&self, _project: &ProjectRef, _git_ref: &str, path: &str) -> Option<String> {
            return self.0.get(path).map(|s| s.to_string());
        }
    }

    fn context() -> Context {
        Context {
            requested_path: Some("docs/index.md".to_string()),
            ..Context::for_project(ProjectRef {
                default_branch: "main".to_string(),
                full_path: "g/p".to_string(),
                id: 1,
                name: String::new(),
            })
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut result = RenderResult::default();
        assert_eq!(truncate_source("héllo", 2, &mut result), "h...");
        assert!(result.truncated);

        let mut result = RenderResult::default();
        assert_eq!(truncate_source("short", 5, &mut result), "short");
        assert!(!result.truncated);
    }

    #[test]
    fn includes_are_expanded_relative_to_requested_path() {
        let files = Files(HashMap::from([("docs/part.md", "included text\n")]));
        let services = Services::new(&NullBackend, &NullBackend).with_blobs(&files);
        let mut result = RenderResult::default();
        let out = expand_includes("a\n::include{file=part.md}\nb", &context(), &services, 32, &mut result);
        assert_eq!(out, "a\nincluded text\nb");
        assert!(result.errors.is_empty());
    }

    #[test]
    fn missing_files_and_limits_are_recorded() {
        let files = Files(HashMap::from([("docs/a.md", "A")]));
        let services = Services::new(&NullBackend, &NullBackend).with_blobs(&files);
        let mut result = RenderResult::default();
        let out = expand_includes(
            "::include{file=a.md}\n::include{file=gone.md}\n::include{file=a.md}",
            &context(),
            &services,
            2,
            &mut result,
        );
        assert_eq!(out, "A\n**Error** including `gone.md`: file not found\n::include{file=a.md}");
        let kinds: Vec<FilterErrorKind> = result.errors.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![FilterErrorKind::IncludeFailed, FilterErrorKind::IncludeLimit]);
    }

    #[test]
    fn without_blob_source_directives_stay_literal() {
        let mut result = RenderResult::default();
        let text = "::include{file=a.md}";
        assert_eq!(expand_includes(text, &context(), &Services::default(), 32, &mut result), text);
    }
}
