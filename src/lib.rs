//! Composable markdown-to-HTML filter pipeline.
//!
//! Markdown goes through source hooks and conversion into a [`Document`],
//! then an ordered chain of [`Filter`]s rewrites links, adds markup and
//! resolves references in batches, then the sanitizer runs last.
//!
//! ```no_run
//! use banzai::{Context, Pipeline, PipelineKind, RenderConfig, Services};
//!
//! let pipeline = Pipeline::for_kind(PipelineKind::PlainMarkdown, RenderConfig::default());
//! let rendered = pipeline.call("See http://example.com/", &Context::default(), &Services::default())?;
//! println!("{}", rendered.html);
//! # Ok::<(), banzai::Error>(())
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod filter;
pub mod filters;
pub mod hasher;
pub mod markdown;
pub mod pipeline;
pub mod result;
pub mod store;
pub mod types;

pub use backend::{AbilityOracle, AssetProxy, BlobSource, MarkdownConverter, NullBackend, ReferenceBackend, Services};
pub use cache::ResolutionCache;
pub use config::RenderConfig;
pub use context::{Context, ContextKey, GroupRef, ProjectRef, UserRef, WikiRef};
pub use document::{Document, NodeId};
pub use error::{Error, FilterError, FilterErrorKind};
pub use filter::{Filter, FilterCategory, FilterContext};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineKind};
pub use result::{RenderResult, Rendered};
pub use store::EntityStore;
pub use types::{Entity, EntityRef, ReferenceType, ScopePath};
