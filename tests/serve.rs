//! End-to-end tests: real listener, real filesystem watcher.

mod common;

use livereload::{DevServer, ReloadEvent, ServeError, ServerState};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;

use common::{config_for, Running, EVENT_TIMEOUT, QUIET_PERIOD};

async fn next_event(rx: &mut broadcast::Receiver<ReloadEvent>) -> ReloadEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("no reload event within timeout")
        .unwrap()
}

async fn fetch(url: &str) -> String {
    reqwest::get(url).await.unwrap().text().await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serves_files_from_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html><body>hello</body></html>").unwrap();
    std::fs::write(dir.path().join("app.js"), "let x = 1;").unwrap();

    let server = Running::start(config_for(dir.path())).await;

    let page = fetch(&server.url("/")).await;
    assert!(page.contains("hello"));
    assert!(page.contains("/__livereload"));
    assert_eq!(fetch(&server.url("/app.js")).await, "let x = 1;");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn occupied_port_is_a_bind_error() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let config = config_for(dir.path()).with_port(port);
    let err = DevServer::new(config.clone()).bind().await.unwrap_err();
    assert!(matches!(err, ServeError::Bind { .. }), "got {err:?}");

    // The blocking entry point fails the same way instead of serving
    let err = livereload::serve(config).await.unwrap_err();
    assert!(matches!(err, ServeError::Bind { .. }), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_root_is_a_path_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir.path().join("nope"));
    let err = livereload::serve(config).await.unwrap_err();
    assert!(matches!(err, ServeError::Path { .. }), "got {err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn matching_change_triggers_reload() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();

    let server = Running::start(config_for(dir.path())).await;
    let mut rx = server.handle.subscribe();

    std::fs::write(dir.path().join("app.js"), "let y = 2;").unwrap();
    let event = next_event(&mut rx).await;
    assert_eq!(event, ReloadEvent::Reload { paths: vec!["app.js".to_string()] });

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_matching_change_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();

    let server = Running::start(config_for(dir.path())).await;
    let mut rx = server.handle.subscribe();

    std::fs::write(dir.path().join("notes.txt"), "todo").unwrap();
    // `*.html` does not reach into subdirectories
    std::fs::write(dir.path().join("sub/page.html"), "<p></p>").unwrap();

    assert!(tokio::time::timeout(QUIET_PERIOD, rx.recv()).await.is_err());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stylesheet_change_hot_swaps() {
    let dir = tempfile::tempdir().unwrap();
    let server = Running::start(config_for(dir.path())).await;
    let mut rx = server.handle.subscribe();

    std::fs::write(dir.path().join("style.css"), "body { color: red; }").unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        ReloadEvent::Css { paths: vec!["style.css".to_string()] }
    );

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn served_content_is_fresh_after_change() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.html");
    std::fs::write(&index, "<html><body>v1</body></html>").unwrap();

    let server = Running::start(config_for(dir.path()).with_inject(false)).await;
    let mut rx = server.handle.subscribe();
    assert_eq!(fetch(&server.url("/")).await, "<html><body>v1</body></html>");

    std::fs::write(&index, "<html><body>v2</body></html>").unwrap();
    next_event(&mut rx).await;
    assert_eq!(fetch(&server.url("/")).await, "<html><body>v2</body></html>");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_edit_produces_exactly_one_reload() {
    let dir = tempfile::tempdir().unwrap();
    let index = dir.path().join("index.html");
    std::fs::write(&index, "<html><body>before</body></html>").unwrap();

    let server = Running::start(config_for(dir.path())).await;
    let mut rx = server.handle.subscribe();

    std::fs::write(&index, "<html><body>after</body></html>").unwrap();

    let event = next_event(&mut rx).await;
    assert_eq!(event, ReloadEvent::Reload { paths: vec!["index.html".to_string()] });
    assert!(tokio::time::timeout(QUIET_PERIOD, rx.recv()).await.is_err());

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_stops_serving() {
    let dir = tempfile::tempdir().unwrap();
    let server = Running::start(config_for(dir.path())).await;
    let handle = server.handle.clone();

    server.stop().await;
    handle.stopped().await;
    assert_eq!(handle.state(), ServerState::Stopped);
}
