//! HTTP server with static files + WebSocket live reload.
//!
//! Lifecycle is explicit: [`DevServer`] (idle) → [`DevServer::bind`] →
//! [`BoundServer::run`] (serving) → stopped once [`ServerHandle::shutdown`]
//! is called or the run signal fires.

use crate::config::ServerConfig;
use crate::error::ServeError;
use crate::inject::{inject_livereload, RELOAD_JS};
use crate::reload::ReloadEvent;
use crate::watcher::FileWatcher;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderValue},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// WebSocket endpoint the injected client connects to.
pub const RELOAD_WS_PATH: &str = "/__livereload";
/// The client script, for pages that include it by hand (`--no-inject`).
pub const RELOAD_SCRIPT_PATH: &str = "/__livereload.js";

const RELOAD_CHANNEL_CAPACITY: usize = 16;

/// Server lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Configured (and possibly bound), not yet serving.
    Idle,
    /// Listener active, watches live.
    Serving,
    /// Serve loop has returned. Terminal.
    Stopped,
}

// ───────────────────── Shared state ─────────────────────

#[derive(Clone)]
struct AppState {
    reload_tx: broadcast::Sender<ReloadEvent>,
    shutdown_rx: watch::Receiver<bool>,
    client_counter: Arc<AtomicU64>,
}

// ───────────────────── WebSocket handler ─────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.reload_tx.subscribe();
    let mut shutdown = state.shutdown_rx.clone();
    let client_id = state.client_counter.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(client_id, "Browser connected");

    loop {
        tokio::select! {
            // Server → Browser: reload commands
            result = rx.recv() => {
                let event = match result {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(client_id, skipped, "Client lagged, forcing full reload");
                        ReloadEvent::full()
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Ok(msg) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(msg.into())).await.is_err() {
                    break;
                }
            }
            // Browser → Server: only close frames matter
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            // The watch guard must not outlive this branch; the task has to stay `Send`
            () = async {
                let _ = shutdown.wait_for(|stop| *stop).await;
            } => break,
        }
    }

    tracing::debug!(client_id, "Browser disconnected");
}

async fn script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        RELOAD_JS,
    )
}

// ───────────────────── Build router ─────────────────────

fn build_router(root: &Path, inject: bool, state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let serve_dir = ServeDir::new(root).append_index_html_on_directories(true);

    let mut app = Router::new()
        .route(RELOAD_WS_PATH, get(ws_handler))
        .route(RELOAD_SCRIPT_PATH, get(script_handler))
        .fallback_service(serve_dir);

    if inject {
        app = app.layer(middleware::from_fn(inject_livereload));
    }

    // Cache-Control: no-cache — browser must revalidate every request (304 still works),
    // so a reload never shows stale assets.
    app.layer(SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    ))
    .layer(TraceLayer::new_for_http())
    .layer(cors)
    .with_state(state)
}

// ───────────────────── Handle ─────────────────────

/// Cloneable control handle for a bound server.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    shutdown_tx: Arc<watch::Sender<bool>>,
    state_tx: Arc<watch::Sender<ServerState>>,
    reload_tx: broadcast::Sender<ReloadEvent>,
}

impl ServerHandle {
    /// Stop accepting connections, close WebSocket clients and end `run`.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn state(&self) -> ServerState {
        *self.state_tx.borrow()
    }

    /// Resolves once the server has reached [`ServerState::Stopped`].
    pub async fn stopped(&self) {
        let mut rx = self.state_tx.subscribe();
        let _ = rx.wait_for(|state| *state == ServerState::Stopped).await;
    }

    /// Receive every reload event sent to browsers.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.reload_tx.subscribe()
    }

    /// Number of live reload subscribers: connected browsers plus [`Self::subscribe`] receivers.
    pub fn subscriber_count(&self) -> usize {
        self.reload_tx.receiver_count()
    }

    /// Force a full reload of every connected browser. Returns the number of receivers.
    pub fn reload(&self) -> usize {
        self.reload_tx.send(ReloadEvent::full()).unwrap_or(0)
    }
}

// ───────────────────── Server ─────────────────────

/// A configured server that has not bound anything yet.
#[derive(Debug)]
pub struct DevServer {
    config: ServerConfig,
}

impl DevServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Validate the root, bind the listener and start watching.
    ///
    /// Fails with [`ServeError::Path`] / [`ServeError::NotADirectory`] for a bad root
    /// and [`ServeError::Bind`] if the port is unavailable. Nothing is retried.
    pub async fn bind(self) -> Result<BoundServer, ServeError> {
        let config = self.config;
        let root = config.validate_root()?;

        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServeError::Bind {
                addr: config.display_addr(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let (reload_tx, _) = broadcast::channel::<ReloadEvent>(RELOAD_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, _) = watch::channel(ServerState::Idle);

        let watcher = FileWatcher::spawn(config.watch_options(&root), reload_tx.clone())?;

        if config.watches.is_empty() {
            tracing::warn!("No watch patterns registered; browsers will never be reloaded");
        }

        let state = Arc::new(AppState {
            reload_tx: reload_tx.clone(),
            shutdown_rx,
            client_counter: Arc::new(AtomicU64::new(0)),
        });
        let router = build_router(&root, config.inject, state);

        tracing::debug!(
            root = %root.display(),
            addr = %local_addr,
            patterns = ?config.watches.patterns().collect::<Vec<_>>(),
            "Server bound"
        );

        Ok(BoundServer {
            listener,
            router,
            watcher,
            local_addr,
            root,
            config,
            handle: ServerHandle {
                shutdown_tx: Arc::new(shutdown_tx),
                state_tx: Arc::new(state_tx),
                reload_tx,
            },
        })
    }
}

/// A server with its listener bound and watches live, ready to run.
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    router: Router,
    watcher: FileWatcher,
    local_addr: SocketAddr,
    root: PathBuf,
    config: ServerConfig,
    handle: ServerHandle,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Canonical served root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Serve until [`ServerHandle::shutdown`] is called.
    pub async fn run(self) -> Result<(), ServeError> {
        let Self {
            listener,
            router,
            watcher,
            local_addr,
            handle,
            ..
        } = self;

        let mut shutdown_rx = handle.shutdown_tx.subscribe();
        handle.state_tx.send_replace(ServerState::Serving);
        tracing::info!(addr = %local_addr, "Serving");

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            })
            .await;

        watcher.stop();
        handle.state_tx.send_replace(ServerState::Stopped);
        tracing::info!("Server stopped");

        result.map_err(ServeError::Io)
    }

    /// Serve until `signal` resolves or [`ServerHandle::shutdown`] is called.
    pub async fn run_until<F>(self, signal: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.handle();
        let signal_task = tokio::spawn(async move {
            signal.await;
            handle.shutdown();
        });
        let result = self.run().await;
        signal_task.abort();
        result
    }
}

// ───────────────────── Startup banner ─────────────────────

fn print_banner(server: &BoundServer) {
    let config = &server.config;
    let reload_mode = if config.full_reload {
        "full page"
    } else {
        "CSS hot swap"
    };
    let patterns: Vec<_> = config.watches.patterns().collect();

    println!();
    println!("  livereload v{}", env!("CARGO_PKG_VERSION"));
    println!("  ─────────────────────────────────────");
    println!("  Root:    {}", server.root.display());
    println!("  Local:   http://{}", server.local_addr);
    println!("  Watch:   {}", patterns.join(", "));
    println!("  Reload:  {reload_mode}");
    println!("  ─────────────────────────────────────");
    println!();
}

// ───────────────────── Run server ─────────────────────

/// Bind and serve `config` until Ctrl-C. Startup failures return immediately.
pub async fn serve(config: ServerConfig) -> Result<(), ServeError> {
    let server = DevServer::new(config).bind().await?;
    print_banner(&server);
    server.run_until(ctrl_c()).await
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C; stop the process externally");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
