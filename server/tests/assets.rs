use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use todos_server::{app, AppState, Config};

const INDEX: &str = "<!DOCTYPE html><div id=\"root\"></div>";

/// A frontend build with an outside file that must stay unreachable.
fn bundle() -> (tempfile::TempDir, Config) {
    let outer = tempfile::tempdir().unwrap();
    let root = outer.path().join("dist");
    std::fs::create_dir_all(root.join("assets")).unwrap();
    std::fs::write(root.join("index.html"), INDEX).unwrap();
    std::fs::write(root.join("index.js"), "console.log('app')").unwrap();
    std::fs::write(root.join("assets/logo.svg"), "<svg/>").unwrap();
    std::fs::write(root.join("assets/data.bin"), [0u8, 1, 2]).unwrap();
    std::fs::write(outer.path().join("secret.txt"), "top secret").unwrap();

    let config = Config {
        static_root: root,
        ..Config::default()
    };
    (outer, config)
}

async fn get(config: &Config, uri: &str) -> axum::response::Response {
    let router = app(AppState::in_memory(config.clone()));
    router
        .oneshot(Request::builder().uri(uri).body(String::new()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

#[tokio::test]
async fn entry_route_serves_index_verbatim() {
    let (_dir, config) = bundle();
    let resp = get(&config, "/static_root/").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(body_bytes(resp).await, INDEX.as_bytes());
}

#[tokio::test]
async fn files_get_inferred_content_types() {
    let (_dir, config) = bundle();

    let resp = get(&config, "/static_root/index.js").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/javascript; charset=utf-8");

    let resp = get(&config, "/static_root/assets/logo.svg").await;
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/svg+xml");
    assert_eq!(body_bytes(resp).await, "<svg/>".as_bytes());

    let resp = get(&config, "/static_root/assets/data.bin").await;
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(body_bytes(resp).await, [0u8, 1, 2].as_slice());
}

#[tokio::test]
async fn missing_directories_and_escapes_are_404() {
    let (_dir, config) = bundle();
    for uri in [
        "/static_root/nope.css",
        "/static_root/assets",
        "/static_root/../secret.txt",
        "/static_root/%2e%2e/secret.txt",
        "/static_root/assets/%2e%2e/%2e%2e/secret.txt",
    ] {
        let resp = get(&config, uri).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn entry_without_bundle_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        static_root: dir.path().join("not-built"),
        ..Config::default()
    };
    let resp = get(&config, "/static_root/").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
