//! Live-reload static file server.
//!
//! Serves a directory over HTTP, injects a small WebSocket client into HTML
//! pages and tells every connected browser to refresh when a file matching one
//! of the registered glob patterns changes.
//!
//! ```no_run
//! use livereload::{serve, ServerConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut config = ServerConfig::new(".").with_port(8000);
//! config.register_watch("*.html")?;
//! config.register_watch("*.css")?;
//! config.register_watch("*.js")?;
//! serve(config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router ──► ServeDir (root)
//!    ▲                  │
//!    │                  └─► inject middleware (adds client script to HTML)
//!    │
//!    └──WebSocket /__livereload ◄── broadcast ◄── fs-watcher thread ◄── notify
//! ```

pub mod config;
pub mod error;
pub mod inject;
pub mod patterns;
pub mod reload;
pub mod server;
pub mod watcher;

pub use config::ServerConfig;
pub use error::{ServeError, WatchError};
pub use patterns::{WatchPattern, WatchSet};
pub use reload::ReloadEvent;
pub use server::{serve, BoundServer, DevServer, ServerHandle, ServerState};
