//! Watch patterns and ignore rules.
//!
//! Patterns are matched against the path of a changed file relative to the
//! served root, always with `/` separators. `*` stops at directory separators,
//! so `*.html` only matches files directly in the root and `**/*.html` matches
//! at any depth.

use std::path::Path;

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::error::WatchError;

/// Directories that never trigger a reload.
const IGNORE_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__", ".venv"];
/// Editor swap files and other temporary artifacts.
const IGNORE_EXTS: &[&str] = &["pyc", "pyo", "swp", "swo", "tmp"];

/// A single compiled glob, scoped to the served root.
#[derive(Debug, Clone)]
pub struct WatchPattern {
    pattern: String,
    matcher: GlobMatcher,
}

impl WatchPattern {
    pub fn new(pattern: &str) -> Result<Self, WatchError> {
        let normalized = pattern.trim().replace('\\', "/");
        let normalized = normalized.trim_start_matches("./");

        if normalized.is_empty() {
            return Err(WatchError::EmptyPattern);
        }
        if normalized.starts_with('/')
            || Path::new(normalized).is_absolute()
            || normalized.split('/').any(|segment| segment == "..")
        {
            return Err(WatchError::OutsideRoot(pattern.to_string()));
        }

        let matcher = GlobBuilder::new(normalized)
            .literal_separator(true)
            .build()
            .map_err(|source| WatchError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();

        Ok(Self {
            pattern: normalized.to_string(),
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// `relative` must use `/` separators (see [`relative_path`]).
    pub fn is_match(&self, relative: &str) -> bool {
        self.matcher.is_match(relative)
    }
}

/// The set of patterns that trigger a reload.
#[derive(Debug, Clone, Default)]
pub struct WatchSet {
    patterns: Vec<WatchPattern>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern. Returns `Ok(false)` if an identical pattern is already registered.
    pub fn insert(&mut self, pattern: &str) -> Result<bool, WatchError> {
        let pattern = WatchPattern::new(pattern)?;
        if self.patterns.iter().any(|p| p.as_str() == pattern.as_str()) {
            return Ok(false);
        }
        self.patterns.push(pattern);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(WatchPattern::as_str)
    }

    pub fn matches(&self, relative: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(relative))
    }
}

/// Built-in and user-provided ignore rules.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    user_globs: Option<GlobSet>,
}

impl IgnoreRules {
    /// Build from user globs (e.g. `["**/*.min.js", "drafts/**"]`).
    /// Invalid globs are logged and skipped.
    pub fn new(patterns: &[String]) -> Self {
        if patterns.is_empty() {
            return Self::default();
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => tracing::warn!(%pattern, error = %e, "Skipping invalid ignore pattern"),
            }
        }
        let user_globs = match builder.build() {
            Ok(set) => Some(set),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build ignore patterns");
                None
            }
        };
        Self { user_globs }
    }

    pub fn is_ignored(&self, relative: &str) -> bool {
        if relative
            .split('/')
            .any(|segment| IGNORE_DIRS.contains(&segment))
        {
            return true;
        }
        if relative.ends_with('~') {
            return true;
        }
        if let Some(ext) = Path::new(relative).extension() {
            if IGNORE_EXTS.contains(&ext.to_string_lossy().as_ref()) {
                return true;
            }
        }
        self.user_globs
            .as_ref()
            .is_some_and(|globs| globs.is_match(relative))
    }
}

/// Path of `path` relative to `root`, with `/` separators.
/// `None` when the path lies outside the root.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let relative = relative.to_string_lossy().replace('\\', "/");
    if relative.is_empty() {
        None
    } else {
        Some(relative)
    }
}
