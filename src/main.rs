mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use banzai::diagnostics;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{EXIT_FATAL, RenderOptions};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "BANZAI_LOG";

/// Command line.
#[derive(Parser)]
#[command(name = "banzai", about = "Render markdown through a filter pipeline", version)]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Render one markdown file to stdout
    Render {
        /// Markdown file to render
        file: PathBuf,
        #[command(flatten)]
        options: PipelineArgs,
        /// Print the result envelope as JSON instead of bare HTML
        #[arg(long)]
        json: bool,
    },
    /// Render every markdown file under a directory, writing `.html` beside each
    RenderAll {
        /// Directory to scan
        dir: PathBuf,
        #[command(flatten)]
        options: PipelineArgs,
        /// Worker threads (defaults to available parallelism)
        #[arg(long, short)]
        jobs: Option<usize>,
    },
}

/// Options shared by both render commands.
#[derive(Args)]
struct PipelineArgs {
    /// Config file (defaults to `.banzai.toml` in the root)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Context TOML: project, group, current_user and render options
    #[arg(long)]
    context: Option<PathBuf>,
    /// Pipeline: full, description, plain-markdown, single-line, post-process
    #[arg(long, short, default_value = "full")]
    pipeline: String,
    /// Entity store TOML used to resolve and redact references
    #[arg(long)]
    store: Option<PathBuf>,
}

impl From<PipelineArgs> for RenderOptions {
    fn from(args: PipelineArgs) -> Self {
        return Self {
            config: args.config,
            context: args.context,
            pipeline: args.pipeline,
            store: args.store,
        };
    }
}

/// Log to stderr, filtered by `BANZAI_LOG` (default `warn`).
fn init_logging() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Entry point: run a subcommand, print diagnostics, map the outcome to an exit code.
fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render { file, options, json } => commands::render(&file, &options.into(), json),
        Commands::RenderAll { dir, options, jobs } => commands::render_all(&dir, &options.into(), jobs),
    };

    return match result {
        Ok(code) => code,
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(EXIT_FATAL)
        },
    };
}
