//! Server configuration — created once at startup, read-only afterwards.
//!
//! Defaults mirror the classic "serve this folder" script:
//! current directory, `127.0.0.1:8000`, reload on `*.html`, `*.css` and `*.js`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ServeError, WatchError};
use crate::patterns::{IgnoreRules, WatchSet};
use crate::watcher::WatchOptions;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;
pub const DEFAULT_WATCH_PATTERNS: &[&str] = &["*.html", "*.css", "*.js"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub root: PathBuf,
    pub host: String,
    /// `0` binds an ephemeral port.
    pub port: u16,
    pub watches: WatchSet,
    pub ignore_patterns: Vec<String>,
    pub debounce: Duration,
    /// Disable CSS hot swap; every change reloads the page.
    pub full_reload: bool,
    /// Insert the reload script into served HTML pages.
    pub inject: bool,
}

impl ServerConfig {
    /// A config for `root` with default host/port and an empty watch set.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            watches: WatchSet::new(),
            ignore_patterns: Vec::new(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            full_reload: false,
            inject: true,
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_full_reload(mut self, full_reload: bool) -> Self {
        self.full_reload = full_reload;
        self
    }

    #[must_use]
    pub fn with_inject(mut self, inject: bool) -> Self {
        self.inject = inject;
        self
    }

    #[must_use]
    pub fn with_ignore(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Register a glob that triggers a reload when a matching file under the root changes.
    ///
    /// Returns `Ok(false)` if the pattern was already registered.
    pub fn register_watch(&mut self, pattern: &str) -> Result<bool, WatchError> {
        let added = self.watches.insert(pattern)?;
        if added {
            tracing::debug!(%pattern, "Registered watch pattern");
        }
        Ok(added)
    }

    /// Check the root is a readable directory and return its canonical path.
    pub fn validate_root(&self) -> Result<PathBuf, ServeError> {
        let path_error = |source| ServeError::Path {
            path: self.root.clone(),
            source,
        };
        let root = self.root.canonicalize().map_err(path_error)?;
        if !root.is_dir() {
            return Err(ServeError::NotADirectory(self.root.clone()));
        }
        std::fs::read_dir(&root).map_err(path_error)?;
        Ok(root)
    }

    /// Human-readable `host:port` used in logs and bind errors.
    pub fn display_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub(crate) fn watch_options(&self, root: &Path) -> WatchOptions {
        WatchOptions {
            root: root.to_path_buf(),
            watches: self.watches.clone(),
            ignore: IgnoreRules::new(&self.ignore_patterns),
            debounce: self.debounce,
            full_reload: self.full_reload,
        }
    }
}

impl Default for ServerConfig {
    /// Current directory, port 8000, default watch patterns.
    fn default() -> Self {
        let mut config = Self::new(".");
        for pattern in DEFAULT_WATCH_PATTERNS {
            if let Err(e) = config.register_watch(pattern) {
                tracing::warn!(error = %e, "Ignoring built-in watch pattern");
            }
        }
        config
    }
}
