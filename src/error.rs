/// Crate-level error types for the rendering pipeline.
use std::path::PathBuf;

use serde::Serialize;

/// Fatal errors. A pipeline run only returns one of these for integration
/// bugs (missing context) or I/O around it; degraded rendering is reported
/// through [`FilterError`] instead.
#[allow(clippy::error_impl_error, reason = "crate-level error type re-exported from lib")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `.banzai.toml` named explicitly on the command line does not exist.
    #[error("config not found: {}", path.display())]
    ConfigNotFound {
        /// Path to the missing config file.
        path: PathBuf,
    },

    /// An input file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON serialization of the result envelope failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped serde_json error.
        #[from]
        serde_json::Error,
    ),

    /// A filter declared a context key the caller did not provide.
    #[error("{filter} requires the :{key} context key")]
    MissingContextKey {
        /// Name of the filter that declared the requirement.
        filter: &'static str,
        /// Name of the missing key.
        key: &'static str,
    },

    /// Entity store file exists but its contents are inconsistent.
    #[error("entity store corrupt: {reason}")]
    StoreCorrupt {
        /// Description of the inconsistency.
        reason: String,
    },

    /// Entity store file does not exist.
    #[error("entity store not found: {}", path.display())]
    StoreNotFound {
        /// Path to the missing store.
        path: PathBuf,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// No pipeline is registered under this name.
    #[error("unknown pipeline: `{name}`")]
    UnknownPipeline {
        /// The name that failed to match.
        name: String,
    },
}

/// Why a filter's work was cut short or left partially undone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterErrorKind {
    /// An include directive could not be read.
    IncludeFailed,
    /// More include directives than `max_includes`; the rest stay literal.
    IncludeLimit,
    /// More matches than the per-filter item limit; the rest stay literal.
    ItemLimit,
    /// The filter exceeded its wall-clock budget and its effect was discarded.
    Timeout,
}

/// A recovered, per-filter failure recorded in the result envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterError {
    /// Name of the filter that recorded the error.
    pub filter: &'static str,
    /// Category of the failure.
    pub kind: FilterErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl FilterError {
    /// Build a new recorded error.
    pub fn new(filter: &'static str, kind: FilterErrorKind, message: impl Into<String>) -> Self {
        return Self {
            filter,
            kind,
            message: message.into(),
        };
    }
}
