//! Error types — fatal startup failures and non-fatal watch pattern errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listener could not be bound (port in use, privileged port, bad host).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The root directory is missing or unreadable.
    #[error("root directory {} is not accessible: {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The root exists but is a file.
    #[error("root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// The filesystem subscription could not be established.
    #[error("failed to watch root directory: {0}")]
    Watcher(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A watch pattern was rejected. Never fatal: callers log it and move on.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid watch pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("watch pattern is empty")]
    EmptyPattern,

    /// Absolute patterns and `..` segments would match outside the served root.
    #[error("watch pattern `{0}` points outside the served root")]
    OutsideRoot(String),
}
