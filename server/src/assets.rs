//! Static file serving for the built frontend bundle.
//!
//! Requested paths are resolved against the configured root and
//! canonicalized, so `..` segments and symlinks that lead outside the root
//! are refused. Only regular files are served.

use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::AppState;

const ENTRY_FILE: &str = "index.html";
const FALLBACK_MIME: &str = "application/octet-stream";

/// `GET /static_root/`: the app entry page.
pub async fn entry(State(state): State<AppState>) -> Response {
    serve(&state.config.static_root, ENTRY_FILE).await
}

/// `GET /static_root/{*path}`
pub async fn file(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    serve(&state.config.static_root, &path).await
}

pub async fn serve(root: &FsPath, requested: &str) -> Response {
    let Some(path) = resolve(root, requested).await else {
        return not_found();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&path))],
            bytes,
        )
            .into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read static file");
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// Map `requested` to an existing regular file inside `root`.
pub async fn resolve(root: &FsPath, requested: &str) -> Option<PathBuf> {
    let root = tokio::fs::canonicalize(root).await.ok()?;
    let candidate = tokio::fs::canonicalize(root.join(requested.trim_start_matches('/')))
        .await
        .ok()?;
    if !candidate.starts_with(&root) {
        warn!(%requested, "static path escapes root");
        return None;
    }
    let metadata = tokio::fs::metadata(&candidate).await.ok()?;
    metadata.is_file().then_some(candidate)
}

pub fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json" | "map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("wasm") => "application/wasm",
        _ => FALLBACK_MIME,
    }
}
