use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::Value;
use snapbin_blob::MemoryBlobStore;
use snapbin_core::SnapConfig;
use snapbin_server::build_with_store;
use tower::ServiceExt;

#[tokio::test]
async fn health_ok() {
    let app = build_with_store(SnapConfig::new("test"), Arc::new(MemoryBlobStore::new()));

    let res = app
        .router
        .oneshot(Request::builder().method("GET").uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 200);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(std::str::from_utf8(&bytes).unwrap(), "ok");
}

#[tokio::test]
async fn upload_then_fetch_round_trip() {
    let app = build_with_store(SnapConfig::new("test"), Arc::new(MemoryBlobStore::new()));

    let res = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("https://i.example.com/upload?filename=hello.txt")
                .header("x-auth-key", "test")
                .header("content-type", "text/plain")
                .header("content-length", "5")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let image = body["image"].as_str().unwrap();
    let path = image.trim_start_matches("https://i.example.com");
    assert!(path.starts_with("/file/"));
    assert!(path.ends_with("/hello.txt"));

    let res = app
        .router
        .oneshot(Request::builder().method("GET").uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.headers()["content-type"], "text/plain");
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"hello");
}
