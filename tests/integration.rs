use std::path::Path;
use std::process::{Command, Output};

fn banzai_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_banzai"));
    cmd.current_dir(dir);
    cmd.env_remove("BANZAI_LOG");
    cmd
}

fn site() -> &'static Path {
    Path::new("tests/fixtures/site")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Copy the `site` fixture into a scratch directory so `render-all` can
/// write next to the sources.
fn scratch_site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    for file in ["store.toml", "context.toml", "docs/index.md", "docs/part.md"] {
        std::fs::copy(site().join(file), dir.path().join(file)).unwrap();
    }
    dir
}

#[test]
fn render_resolves_and_redacts_references() {
    let output = banzai_cmd(site())
        .args(["render", "docs/index.md", "--context", "context.toml", "--store", "store.toml"])
        .output()
        .unwrap();
    assert!(output.status.success(), "render failed: {}", stderr(&output));

    let html = stdout(&output);
    assert!(html.contains(r#"href="/acme/app/-/issues/123""#), "{html}");
    assert!(html.contains(r#"title="Crash on start""#), "{html}");
    assert!(!html.contains(r#"data-issue="124""#), "confidential issue leaked: {html}");
    assert!(html.contains("#124"), "{html}");
    assert!(html.contains(r#"<span class="gl-label">"#), "{html}");
    assert!(html.contains(r#"href="/alice""#), "{html}");
    assert!(html.contains("<gl-emoji"), "include was not expanded: {html}");
    assert!(html.contains(r#"id="user-content-release-notes""#), "{html}");
    assert!(html.contains(r#"target="_blank""#), "{html}");
}

#[test]
fn render_json_reports_references() {
    let output = banzai_cmd(site())
        .args(["render", "docs/index.md", "--context", "context.toml", "--store", "store.toml", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "render failed: {}", stderr(&output));

    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(envelope["references"]["issue"], serde_json::json!([{ "kind": "issue", "id": 123 }]));
    assert_eq!(envelope["references"]["user"], serde_json::json!([{ "kind": "user", "id": 2 }]));
    assert_eq!(envelope["errors"], serde_json::json!([]));
    assert_eq!(envelope["timed_out"], serde_json::json!(false));
}

#[test]
fn render_without_context_leaves_references_literal() {
    let output = banzai_cmd(site()).args(["render", "docs/index.md"]).output().unwrap();
    assert!(output.status.success(), "render failed: {}", stderr(&output));

    let html = stdout(&output);
    assert!(html.contains("Fixes #123 and #124"), "{html}");
    assert!(html.contains("::include{file=part.md}"), "{html}");
}

#[test]
fn unknown_pipeline_suggests_a_name() {
    let output = banzai_cmd(site())
        .args(["render", "docs/index.md", "--pipeline", "PlainMarkdown"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Did you mean `plain-markdown`?"), "{}", stderr(&output));
}

#[test]
fn missing_store_is_fatal() {
    let output = banzai_cmd(site())
        .args(["render", "docs/index.md", "--store", "nowhere.toml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Entity Store Not Found"), "{}", stderr(&output));
}

#[test]
fn missing_file_is_fatal() {
    let output = banzai_cmd(site()).args(["render", "docs/gone.md"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("File Not Found"), "{}", stderr(&output));
}

#[test]
fn render_all_writes_html_beside_sources() {
    let dir = scratch_site();
    let output = banzai_cmd(dir.path())
        .args(["render-all", ".", "--context", "context.toml", "--store", "store.toml", "--jobs", "2"])
        .output()
        .unwrap();
    assert!(output.status.success(), "render-all failed: {}", stderr(&output));
    assert!(
        stdout(&output).contains("Rendered 2 files (0 with filter errors, 0 failed)"),
        "{}",
        stdout(&output)
    );

    let index = std::fs::read_to_string(dir.path().join("docs/index.html")).unwrap();
    assert!(index.contains(r#"data-issue="123""#), "{index}");
    assert!(dir.path().join("docs/part.html").exists());
}

#[test]
fn render_all_reports_degraded_documents() {
    let dir = scratch_site();
    std::fs::write(dir.path().join("docs/broken.md"), "::include{file=missing.md}\n").unwrap();

    let output = banzai_cmd(dir.path())
        .args(["render-all", ".", "--context", "context.toml", "--store", "store.toml"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1), "{}", stderr(&output));
    assert!(stderr(&output).contains("broken.md"), "{}", stderr(&output));

    let broken = std::fs::read_to_string(dir.path().join("docs/broken.html")).unwrap();
    assert!(broken.contains("missing.md"), "{broken}");
}

#[test]
fn render_all_honors_scan_excludes() {
    let dir = scratch_site();
    std::fs::write(dir.path().join(".banzai.toml"), "[scan]\nexclude = [\"docs/part\"]\n").unwrap();

    let output = banzai_cmd(dir.path())
        .args(["render-all", ".", "--context", "context.toml"])
        .output()
        .unwrap();
    assert!(output.status.success(), "render-all failed: {}", stderr(&output));
    assert!(dir.path().join("docs/index.html").exists());
    assert!(!dir.path().join("docs/part.html").exists());
}
