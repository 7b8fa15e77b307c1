use std::fmt::Write as _;

use crate::config::CONFIG_FILE;
use crate::error::Error;
use crate::pipeline::PipelineKind;

/// ANSI bold.
const BOLD: &str = "\x1b[1m";
/// ANSI reset.
const RESET: &str = "\x1b[0m";

/// Render an error as markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic: what happened,
/// then how to fix it where there is a fix.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::MissingContextKey { filter, key } => render_missing_context_key(filter, key),
        Error::UnknownPipeline { name } => render_unknown_pipeline(name),
        Error::StoreCorrupt { reason } => format!("\
# Error: Entity Store Corrupt

{reason}

## Fix

Every scope path and every `(kind, id)` pair must appear once, and every
non-user entity must name a declared scope.
"),
        Error::StoreNotFound { path } => format!("\
# Error: Entity Store Not Found

`{}` does not exist.

## Fix

Pass an existing store with `--store`, or omit the flag to render
without resolving references.
", path.display()),
        _ => render_generic(e),
    };
}

/// Diagnostics for errors without a dedicated renderer.
fn render_generic(e: &Error) -> String {
    return match e {
        Error::FileNotFound { path } => format!("\
# Error: File Not Found

`{}` does not exist.
", path.display()),

        Error::ConfigNotFound { path } => format!("\
# Error: Config Not Found

`{}` does not exist.

## Fix

Drop `--config` to use `{CONFIG_FILE}` from the current directory.
", path.display()),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),
        Error::Json(e) => format!("\
# Error: JSON

{e}
"),
        Error::TomlDe(e) => format!("\
# Error: Invalid TOML

{e}
"),
        // MissingContextKey, UnknownPipeline and store errors never reach here.
        _ => format!("\
# Error

{e}
"),
    }
}

/// Diagnostic naming the missing key and a context snippet that adds it.
fn render_missing_context_key(filter: &str, key: &str) -> String {
    let example = match key {
        "current_user" => "[current_user]\nid = 1\nusername = \"alice\"",
        _ => "[project]\nfull_path = \"group/project\"\nid = 1",
    };
    let mut out = format!("\
# Error: Missing Context Key

The `{filter}` filter requires `{key}`, and the context does not provide it.
No filter ran.

## Fix

Add it to the context file passed with `--context`:

");
    for line in example.lines() {
        let _ = writeln!(out, "    {line}");
    }
    if key == "project" {
        out.push_str("\nA `[group]` table or `skip_project_check = true` also satisfies it.\n");
    }
    return out;
}

/// Diagnostic with a close match, if any, and the full list.
fn render_unknown_pipeline(name: &str) -> String {
    let mut out = format!("\
# Error: Unknown Pipeline

No pipeline is named `{name}`.
");
    if let Some(suggestion) = find_closest_pipeline(name) {
        let _ = write!(out, "\n## Did you mean `{suggestion}`?\n");
    }
    out.push_str("\n## Available pipelines\n\n");
    for kind in PipelineKind::ALL {
        let _ = writeln!(out, "- `{kind}`");
    }
    return out;
}

/// Find a pipeline whose name matches once case and separators are ignored.
pub(crate) fn find_closest_pipeline(name: &str) -> Option<PipelineKind> {
    let normalized = strip_separators(name);
    return PipelineKind::ALL
        .into_iter()
        .find(|kind| strip_separators(kind.name()) == normalized);
}

/// Lowercase and drop `-`, `_` and spaces for fuzzy comparison.
fn strip_separators(s: &str) -> String {
    return s
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect();
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
    fn unknown_pipeline_suggests_close_name() {
        let out = render_error(&Error::UnknownPipeline { name: "PlainMarkdown".to_string() });
        assert!(out.contains("Did you mean `plain-markdown`?"), "{out}");
        assert!(out.contains("- `single-line`"), "{out}");
    }

    #[test]
    fn missing_project_mentions_alternatives() {
        let out = render_error(&Error::MissingContextKey { filter: "issue_reference", key: "project" });
        assert!(out.starts_with("# Error: Missing Context Key"));
        assert!(out.contains("skip_project_check"));
    }

    #[test]
    fn no_suggestion_for_unrelated_names() {
        assert_eq!(find_closest_pipeline("gfm"), None);
    }
}
