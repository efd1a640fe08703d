//! HTML injection middleware — inserts the live-reload WebSocket client before `</body>`.

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    middleware::Next,
};
use http_body_util::BodyExt;

/// Browser client, embedded at compile time from `src/livereload.js`.
pub const RELOAD_JS: &str = include_str!("livereload.js");

/// Insert the reload script before `</body>`, or `</html>`, or at the end.
pub fn inject_script(html: &str) -> String {
    let script = format!("<script>\n{RELOAD_JS}\n</script>");

    if let Some(pos) = html.rfind("</body>").or_else(|| html.rfind("</html>")) {
        format!("{}{}\n{}", &html[..pos], script, &html[pos..])
    } else {
        format!("{html}\n{script}")
    }
}

/// Axum middleware: if the response is a full HTML page, inject the reload script.
pub async fn inject_livereload(req: Request<Body>, next: Next) -> Response<Body> {
    let resp = next.run(req).await;

    // 304s, ranges and errors pass through untouched
    if resp.status() != StatusCode::OK {
        return resp;
    }

    let is_html = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/html"));

    if !is_html {
        return resp;
    }

    let (mut parts, body) = resp.into_parts();
    let collected = match body.collect().await {
        Ok(c) => c.to_bytes(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer HTML response");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let html = String::from_utf8_lossy(&collected);
    let injected = inject_script(&html);

    // Body size changed
    parts.headers.remove(header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(injected))
}
