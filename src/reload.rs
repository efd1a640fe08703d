//! Reload messages pushed to connected browsers over the WebSocket.

use serde::Serialize;

/// One message per coalesced batch of changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadEvent {
    /// Full page reload.
    Reload { paths: Vec<String> },
    /// Only stylesheets changed; the client swaps `<link>` hrefs in place.
    Css { paths: Vec<String> },
}

impl ReloadEvent {
    /// Pick the reload kind for a batch of changed paths (relative to the root).
    pub fn for_changes(paths: Vec<String>, full_reload: bool) -> Self {
        if !full_reload && !paths.is_empty() && paths.iter().all(|p| is_css_file(p)) {
            Self::Css { paths }
        } else {
            Self::Reload { paths }
        }
    }

    /// Reload without a specific cause (forced, or the client missed events).
    pub fn full() -> Self {
        Self::Reload { paths: Vec::new() }
    }

    pub fn paths(&self) -> &[String] {
        match self {
            Self::Reload { paths } | Self::Css { paths } => paths,
        }
    }
}

fn is_css_file(path: &str) -> bool {
    path.to_lowercase().ends_with(".css")
}
