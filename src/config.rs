use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

/// File name looked up in the root directory.
pub const CONFIG_FILE: &str = ".banzai.toml";

/// Pipeline-level configuration loaded from `.banzai.toml`.
/// Budgets and limits here bound the worst-case cost of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Origin prepended to internal links when `only_path` is false.
    pub base_url: String,
    /// Byte and item limits.
    pub limits: Limits,
    /// Include/exclude prefixes for `render-all`.
    pub scan: ScanConfig,
    /// Per-category wall-clock budgets.
    pub timeouts: Timeouts,
}

/// Wall-clock budgets, in milliseconds, per filter category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    /// Tree-walking filters (links, headings, footnotes, redaction).
    pub html_ms: u64,
    /// The sanitizer. Kept the strictest of the three.
    pub sanitize_ms: u64,
    /// Regex-driven text filters (references, autolink, emoji).
    pub text_ms: u64,
}

/// Size limits that cut pathological input down before expensive work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Largest input accepted before source truncation.
    pub max_input_bytes: usize,
    /// Default cap on include directives expanded per document.
    pub max_includes: usize,
    /// Matches processed per reference or pattern filter; the rest stay literal.
    pub reference_item_limit: usize,
}

/// Path prefixes applied to markdown files found by `render-all`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Prefixes to skip.
    pub exclude: Vec<String>,
    /// Prefixes to render; empty means everything.
    pub include: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        return Self {
            base_url: "http://localhost".to_string(),
            limits: Limits::default(),
            scan: ScanConfig::default(),
            timeouts: Timeouts::default(),
        };
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        return Self {
            html_ms: 5_000,
            sanitize_ms: 1_000,
            text_ms: 2_000,
        };
    }
}

impl Default for Limits {
    fn default() -> Self {
        return Self {
            max_input_bytes: 1_048_576,
            max_includes: 32,
            reference_item_limit: 2_000,
        };
    }
}

impl Timeouts {
    /// Budget for tree-walking filters.
    pub const fn html(&self) -> Duration {
        return Duration::from_millis(self.html_ms);
    }

    /// Budget for the sanitizer.
    pub const fn sanitize(&self) -> Duration {
        return Duration::from_millis(self.sanitize_ms);
    }

    /// Budget for regex-driven text filters.
    pub const fn text(&self) -> Duration {
        return Duration::from_millis(self.text_ms);
    }
}

impl RenderConfig {
    /// Load config from `.banzai.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist, and an error if it exists
    /// but is malformed; a config the user wrote is never silently ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(&content);
    }

    /// Load config from an explicit path, which must exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` if the file is missing, or the errors of [`Self::parse`].
    pub fn load_file(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(&content);
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or names unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        return Ok(toml::from_str(content)?);
    }

    /// Check whether a markdown file path should be rendered by `render-all`.
    ///
    /// A path is included if no include patterns are set, or if it starts
    /// with at least one include pattern; an included path is then excluded
    /// if it starts with any exclude pattern.
    pub fn should_render(&self, relative_path: &str) -> bool {
        let included = self.scan.include.is_empty()
            || self.scan.include.iter().any(|p| relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.scan.exclude.iter().any(|p| relative_path.starts_with(p.as_str()));
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
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RenderConfig::load(dir.path()).unwrap();
        assert_eq!(config, RenderConfig::default());
    }

    #[test]
    fn sanitizer_budget_is_strictest_by_default() {
        let t = Timeouts::default();
        assert!(t.sanitize() < t.text());
        assert!(t.sanitize() < t.html());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = RenderConfig::parse("[timeouts]\nsanitize_ms = 10\n").unwrap();
        assert_eq!(config.timeouts.sanitize_ms, 10);
        assert_eq!(config.timeouts.text_ms, 2_000);
        assert_eq!(config.base_url, "http://localhost");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[timeouts\n").unwrap();
        assert!(matches!(RenderConfig::load(dir.path()), Err(Error::TomlDe(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(RenderConfig::parse("colour = true\n").is_err());
    }

    #[test]
    fn include_and_exclude_prefixes() {
        let config = RenderConfig::parse("[scan]\ninclude = [\"docs/\"]\nexclude = [\"docs/drafts/\"]\n").unwrap();
        assert!(config.should_render("docs/guide.md"));
        assert!(!config.should_render("docs/drafts/wip.md"));
        assert!(!config.should_render("README.md"));
    }
}
