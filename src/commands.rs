//! CLI commands: render one file, render a tree of files.

use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use banzai::{
    BlobSource, Context, EntityStore, Error, Pipeline, PipelineKind, ProjectRef, RenderConfig, Rendered, Services,
    diagnostics,
};
use walkdir::WalkDir;

/// Exit code when any document recorded filter errors.
const EXIT_DEGRADED: u8 = 1;
/// Exit code for fatal errors.
pub const EXIT_FATAL: u8 = 2;

/// Flags shared by `render` and `render-all`.
pub struct RenderOptions {
    /// Explicit config file; otherwise `.banzai.toml` in the root.
    pub config: Option<PathBuf>,
    /// Context TOML file.
    pub context: Option<PathBuf>,
    /// Pipeline name.
    pub pipeline: String,
    /// Entity store TOML file.
    pub store: Option<PathBuf>,
}

/// Reads include targets from the working tree under `root`.
struct RepositoryFiles<'a> {
    /// Directory include paths are relative to.
    root: &'a Path,
}

impl BlobSource for RepositoryFiles<'_> {
    fn read_blob(&self, _project: &ProjectRef, _git_ref: &str, path: &str) -> Option<String> {
        let relative = Path::new(path);
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        return std::fs::read_to_string(self.root.join(relative)).ok();
    }
}

/// Everything loaded once and shared by every document of one command.
struct Workspace {
    /// Pipeline configuration.
    config: RenderConfig,
    /// Caller options applied to every document.
    context: Context,
    /// The chain every document runs through.
    pipeline: Pipeline,
    /// Directory the command runs against.
    root: PathBuf,
    /// Entities for resolution and redaction, if a store was given.
    store: Option<EntityStore>,
}

impl Workspace {
    /// Load config, context, store and pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first loading error, or `Error::UnknownPipeline`.
    fn load(root: &Path, options: &RenderOptions) -> Result<Self, Error> {
        let config = match &options.config {
            Some(path) => RenderConfig::load_file(path)?,
            None => RenderConfig::load(root)?,
        };
        // Without a context file, render as if no project applies.
        let context = match &options.context {
            Some(path) => Context::read(path)?,
            None => Context {
                skip_project_check: true,
                ..Context::default()
            },
        };
        let store = options.store.as_deref().map(EntityStore::read).transpose()?;
        let kind: PipelineKind = options.pipeline.parse()?;
        tracing::debug!(pipeline = %kind, root = %root.display(), "workspace loaded");

        return Ok(Self {
            pipeline: Pipeline::for_kind(kind, config.clone()),
            config,
            context,
            root: root.to_path_buf(),
            store,
        });
    }

    /// Render one document. `relative` becomes the requested path unless
    /// the context names one.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingContextKey` if the context does not satisfy the pipeline.
    fn render(&self, relative: &str, source: &str) -> Result<Rendered, Error> {
        let blobs = RepositoryFiles { root: &self.root };
        let services = match &self.store {
            Some(store) => Services::new(store, store),
            None => Services::default(),
        }
        .with_blobs(&blobs);
        let context = Context {
            requested_path: self
                .context
                .requested_path
                .clone()
                .or_else(|| Some(relative.to_string())),
            ..self.context.clone()
        };
        return self.pipeline.call(source, &context, &services);
    }

    /// Render `path` and write the HTML next to it.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound`, `Error::Io` or a pipeline error.
    fn render_file(&self, path: &Path) -> Result<Rendered, Error> {
        let source = read_source(path)?;
        let rendered = self.render(&relative_path(&self.root, path), &source)?;
        std::fs::write(path.with_extension("html"), &rendered.html)?;
        return Ok(rendered);
    }
}

/// Read a source file, replacing invalid UTF-8 sequences.
///
/// # Errors
///
/// Returns `Error::FileNotFound` if the file is missing, or `Error::Io`.
fn read_source(path: &Path) -> Result<String, Error> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::FileNotFound { path: path.to_path_buf() });
        },
        Err(e) => return Err(Error::Io(e)),
    };
    return Ok(String::from_utf8_lossy(&bytes).into_owned());
}

/// `path` relative to `root` with forward slashes.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    return relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
}

/// Print recovered filter errors for one document to stderr.
fn report_filter_errors(path: &Path, rendered: &Rendered) {
    for error in &rendered.errors {
        eprintln!("{}: {} ({:?}): {}", path.display(), error.filter, error.kind, error.message);
    }
}

/// Render one file to stdout.
///
/// # Errors
///
/// Returns loading errors, `Error::FileNotFound`, `Error::Json`, or
/// `Error::MissingContextKey`.
pub fn render(file: &Path, options: &RenderOptions, json: bool) -> Result<ExitCode, Error> {
    let workspace = Workspace::load(Path::new("."), options)?;
    let source = read_source(file)?;
    let rendered = workspace.render(&relative_path(Path::new("."), file), &source)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        print!("{}", rendered.html);
    }
    report_filter_errors(file, &rendered);

    if rendered.errors.is_empty() {
        return Ok(ExitCode::SUCCESS);
    }
    return Ok(ExitCode::from(EXIT_DEGRADED));
}

/// Markdown files under `root` that `[scan]` selects, sorted.
fn collect_markdown(root: &Path, config: &RenderConfig) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .filter(|path| config.should_render(&relative_path(root, path)))
        .collect();
    files.sort();
    return files;
}

/// Render every markdown file under `dir` with a pool of `jobs` workers.
/// Each document is an independent pipeline run with its own cache.
///
/// # Errors
///
/// Returns loading errors. Per-document fatal errors are printed and
/// turn into exit code 2 once every document has been attempted.
pub fn render_all(dir: &Path, options: &RenderOptions, jobs: Option<usize>) -> Result<ExitCode, Error> {
    let workspace = Workspace::load(dir, options)?;
    let files = collect_markdown(dir, &workspace.config);
    let workers = jobs
        .filter(|&n| n > 0)
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, NonZeroUsize::get))
        .min(files.len().max(1));

    let (job_tx, job_rx) = crossbeam_channel::unbounded::<PathBuf>();
    let (done_tx, done_rx) = crossbeam_channel::unbounded::<(PathBuf, Result<Rendered, Error>)>();
    for file in files {
        let _ = job_tx.send(file);
    }
    drop(job_tx);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let workspace = &workspace;
            scope.spawn(move || {
                for path in job_rx {
                    let outcome = workspace.render_file(&path);
                    if done_tx.send((path, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(done_tx);

    let mut outcomes: Vec<(PathBuf, Result<Rendered, Error>)> = done_rx.into_iter().collect();
    outcomes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut rendered_count = 0_usize;
    let mut degraded = 0_usize;
    let mut failed = 0_usize;
    for (path, outcome) in &outcomes {
        match outcome {
            Ok(rendered) => {
                rendered_count = rendered_count.saturating_add(1);
                if !rendered.errors.is_empty() {
                    degraded = degraded.saturating_add(1);
                    report_filter_errors(path, rendered);
                }
            },
            Err(e) => {
                failed = failed.saturating_add(1);
                eprintln!("{}:", path.display());
                diagnostics::print_error(e);
            },
        }
    }

    println!("Rendered {rendered_count} files ({degraded} with filter errors, {failed} failed)");
    if failed > 0 {
        return Ok(ExitCode::from(EXIT_FATAL));
    }
    if degraded > 0 {
        return Ok(ExitCode::from(EXIT_DEGRADED));
    }
    return Ok(ExitCode::SUCCESS);
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
    fn relative_paths_use_forward_slashes() {
        assert_eq!(relative_path(Path::new("docs"), Path::new("docs/a/b.md")), "a/b.md");
        assert_eq!(relative_path(Path::new("."), Path::new("./x.md")), "x.md");
    }

    #[test]
    fn blob_reads_stay_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part.md"), "hi").unwrap();
        let files = RepositoryFiles { root: dir.path() };
        let project = ProjectRef {
            default_branch: "main".to_string(),
            full_path: "g/p".to_string(),
            id: 1,
            name: String::new(),
        };
        assert_eq!(files.read_blob(&project, "main", "part.md").as_deref(), Some("hi"));
        assert_eq!(files.read_blob(&project, "main", "../part.md"), None);
        assert_eq!(files.read_blob(&project, "main", "/etc/passwd"), None);
    }
}
