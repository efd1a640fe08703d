//! Shared helpers for the end-to-end tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use livereload::{DevServer, ServeError, ServerConfig, ServerHandle, ServerState};
use tokio::task::JoinHandle;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
pub const QUIET_PERIOD: Duration = Duration::from_millis(600);

/// Ephemeral port, short coalescing window, the classic `*.html` / `*.css` / `*.js` watches.
pub fn config_for(root: &Path) -> ServerConfig {
    let mut config = ServerConfig::new(root)
        .with_port(0)
        .with_debounce(Duration::from_millis(100));
    for pattern in ["*.html", "*.css", "*.js"] {
        config.register_watch(pattern).unwrap();
    }
    config
}

pub struct Running {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    task: JoinHandle<Result<(), ServeError>>,
}

impl Running {
    pub async fn start(config: ServerConfig) -> Self {
        let server = DevServer::new(config).bind().await.unwrap();
        let addr = server.local_addr();
        let handle = server.handle();
        let task = tokio::spawn(server.run());
        Self { addr, handle, task }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.addr, livereload::server::RELOAD_WS_PATH)
    }

    /// Wait until `n` reload subscribers (browsers or test receivers) are attached.
    pub async fn wait_for_subscribers(&self, n: usize) {
        tokio::time::timeout(EVENT_TIMEOUT, async {
            while self.handle.subscriber_count() < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscribers never attached");
    }

    /// Shut down and wait for the serve loop, which must not hang on open clients.
    pub async fn stop(self) {
        self.handle.shutdown();
        tokio::time::timeout(EVENT_TIMEOUT, self.task)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(self.handle.state(), ServerState::Stopped);
    }
}
