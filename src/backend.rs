//! Collaborators the pipeline consumes but does not own.

use std::collections::HashMap;

use crate::context::{MarkdownEngine, ProjectRef, UserRef};
use crate::document::Document;
use crate::markdown::CommonMark;
use crate::types::{Entity, EntityRef, ReferenceType, ScopePath};

/// Batched entity lookup. The only I/O boundary of a run.
pub trait ReferenceBackend: Sync {
    /// Resolve `tokens` of one type inside one scope. Tokens missing from
    /// the returned map, or mapped to `None`, were not found.
    fn resolve_entities(
        &self,
        kind: ReferenceType,
        scope: &ScopePath,
        tokens: &[String],
    ) -> HashMap<String, Option<Entity>>;

    /// Load entities by identity, for redacting links not resolved in this run.
    fn entities_by_ref(&self, refs: &[EntityRef]) -> Vec<Entity>;
}

/// Authorization oracle for redaction.
pub trait AbilityOracle: Sync {
    /// Whether `user` (anonymous when `None`) may see `entity`.
    fn can_read_reference(&self, user: Option<&UserRef>, entity: &Entity) -> bool;
}

/// Rewrites external image URLs to go through a proxy.
pub trait AssetProxy: Sync {
    /// The proxied form of `url`.
    fn rewrite(&self, url: &str) -> String;
}

/// Repository file access for include directives.
pub trait BlobSource: Sync {
    /// Contents of `path` at `git_ref`, or `None` if unreadable.
    fn read_blob(&self, project: &ProjectRef, git_ref: &str, path: &str) -> Option<String>;
}

/// Markdown to HTML conversion.
pub trait MarkdownConverter: Sync {
    /// Convert markdown text into a document.
    fn convert(&self, text: &str, engine: MarkdownEngine) -> Document;
}

/// A backend that knows nothing: every token is not found.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl ReferenceBackend for NullBackend {
    fn resolve_entities(
        &self,
        _kind: ReferenceType,
        _scope: &ScopePath,
        _tokens: &[String],
    ) -> HashMap<String, Option<Entity>> {
        return HashMap::new();
    }

    fn entities_by_ref(&self, _refs: &[EntityRef]) -> Vec<Entity> {
        return Vec::new();
    }
}

impl AbilityOracle for NullBackend {
    fn can_read_reference(&self, _user: Option<&UserRef>, _entity: &Entity) -> bool {
        return false;
    }
}

/// Shared no-op collaborator for [`Services::default`].
static NULL_BACKEND: NullBackend = NullBackend;
/// Default markdown engine.
static COMMONMARK: CommonMark = CommonMark;

/// The set of collaborators handed to a pipeline run.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    /// Authorization for redaction.
    pub abilities: &'a dyn AbilityOracle,
    /// Optional image proxy.
    pub asset_proxy: Option<&'a dyn AssetProxy>,
    /// Optional repository access for includes.
    pub blobs: Option<&'a dyn BlobSource>,
    /// Markdown converter.
    pub markdown: &'a dyn MarkdownConverter,
    /// Entity resolution.
    pub references: &'a dyn ReferenceBackend,
}

impl<'a> Services<'a> {
    /// Services backed by one store that both resolves and authorizes.
    pub fn new(references: &'a dyn ReferenceBackend, abilities: &'a dyn AbilityOracle) -> Self {
        return Self {
            abilities,
            asset_proxy: None,
            blobs: None,
            markdown: &COMMONMARK,
            references,
        };
    }

    /// Attach an image proxy.
    #[must_use]
    pub fn with_asset_proxy(mut self, proxy: &'a dyn AssetProxy) -> Self {
        self.asset_proxy = Some(proxy);
        return self;
    }

    /// Attach repository access.
    #[must_use]
    pub fn with_blobs(mut self, blobs: &'a dyn BlobSource) -> Self {
        self.blobs = Some(blobs);
        return self;
    }
}

impl Default for Services<'static> {
    /// No references resolve and nothing is readable.
    fn default() -> Self {
        return Self::new(&NULL_BACKEND, &NULL_BACKEND);
    }
}
