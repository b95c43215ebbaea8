use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use snapbin_axum::{build_router, SnapState};
use snapbin_blob::{
    BlobError, BlobMetadata, BlobPut, BlobResult, BlobStore, ByteStream, GetOptions, GetOutcome,
    ListOptions, ListResult, MemoryBlobStore,
};
use snapbin_core::SnapConfig;
use tower::ServiceExt;

struct Fixture {
    router: Router,
    state: SnapState,
    store: Arc<MemoryBlobStore>,
}

fn fixture_with(config: SnapConfig) -> Fixture {
    let store = Arc::new(MemoryBlobStore::new());
    let uploaded = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
    for key in ["test.txt", "test2.txt", "test3.txt"] {
        store.insert_at(key, vec![1u8, 2, 3], BlobPut::new(), uploaded);
    }
    let state = SnapState::new(config, store.clone());
    Fixture {
        router: build_router(state.clone()),
        state,
        store,
    }
}

fn fixture() -> Fixture {
    fixture_with(SnapConfig::new("test"))
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

async fn body_bytes(res: Response) -> Vec<u8> {
    res.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn json_body(res: Response) -> Value {
    serde_json::from_slice(&body_bytes(res).await).unwrap()
}

async fn text_body(res: Response) -> String {
    String::from_utf8(body_bytes(res).await).unwrap()
}

#[tokio::test]
async fn full_get_returns_bytes_and_headers() {
    let fx = fixture();
    let res = send(&fx.router, get("https://i.example.com/file/test.txt").body(Body::empty()).unwrap()).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-request-id").is_some());
    assert_eq!(res.headers()["content-type"], "application/octet-stream");
    assert_eq!(res.headers()["content-length"], "3");
    assert_eq!(res.headers()["accept-ranges"], "bytes");
    assert_eq!(res.headers()["cache-control"], "public, max-age=604800");
    assert_eq!(res.headers()["last-modified"], "Mon, 15 Jan 2024 12:00:00 GMT");
    assert_eq!(body_bytes(res).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn cache_miss_then_hit_is_identical() {
    let fx = fixture();
    let first = send(&fx.router, get("/file/test.txt").body(Body::empty()).unwrap()).await;
    let first_etag = first.headers()["etag"].clone();
    let first_body = body_bytes(first).await;
    fx.state.tasks.settle().await;

    let second = send(&fx.router, get("/file/test.txt?v=2").body(Body::empty()).unwrap()).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers()["etag"], first_etag);
    assert_eq!(body_bytes(second).await, first_body);
}

#[tokio::test]
async fn delete_removes_blob_and_listing_entry() {
    let fx = fixture();

    // Warm the cache so the delete has something to invalidate.
    let warm = send(&fx.router, get("/file/test2.txt").body(Body::empty()).unwrap()).await;
    body_bytes(warm).await;
    fx.state.tasks.settle().await;

    let res = send(
        &fx.router,
        get("/delete?filename=test2.txt").header("x-auth-key", "test").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({"success": true}));

    let res = send(&fx.router, get("/file/test2.txt").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await["success"], false);

    let res = send(&fx.router, get("/files/list?authkey=test").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let listing = json_body(res).await;
    let keys: Vec<_> = listing["objects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["key"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, ["test.txt", "test3.txt"]);
    assert_eq!(listing["truncated"], false);
}

#[tokio::test]
async fn listing_is_in_insertion_order() {
    let fx = fixture();
    let res = send(
        &fx.router,
        get("/files/list").header("x-auth-key", "test").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.headers()["content-type"], "application/json");
    let listing = json_body(res).await;
    let objects = listing["objects"].as_array().unwrap();
    assert_eq!(objects.len(), 3);
    assert_eq!(objects[0]["key"], "test.txt");
    assert_eq!(objects[1]["key"], "test2.txt");
    assert_eq!(objects[2]["key"], "test3.txt");
    assert_eq!(objects[0]["size"], 3);
}

#[tokio::test]
async fn single_range_is_partial_content() {
    let fx = fixture();
    let res = send(
        &fx.router,
        get("/file/test.txt").header("range", "bytes=0-1").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.headers()["content-range"], "bytes 0-1/3");
    assert_eq!(res.headers()["content-length"], "2");
    assert_eq!(body_bytes(res).await, vec![1, 2]);
}

#[tokio::test]
async fn unsupported_ranges_are_plain_text_416() {
    let fx = fixture();
    for range in ["bytes=0-1,2-2", "items=0-1"] {
        let res = send(
            &fx.router,
            get("/file/test.txt").header("range", range).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::RANGE_NOT_SATISFIABLE, "{range}");
        assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));
        assert_eq!(text_body(res).await, "Range Not Satisfiable");
    }
}

#[tokio::test]
async fn matching_if_none_match_is_304() {
    let fx = fixture();
    let meta = fx.store.head("test.txt").await.unwrap().unwrap();
    for candidate in [meta.http_etag(), meta.etag.clone()] {
        let res = send(
            &fx.router,
            get("/file/test.txt").header("if-none-match", candidate.as_str()).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_MODIFIED, "{candidate}");
        assert_eq!(res.headers()["etag"], meta.http_etag().as_str());
        assert!(body_bytes(res).await.is_empty());
    }
}

#[tokio::test]
async fn mismatching_if_match_is_412() {
    let fx = fixture();
    let res = send(
        &fx.router,
        get("/file/test.txt").header("if-match", "\"nope\"").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(text_body(res).await, "Precondition Failed");
}

#[tokio::test]
async fn stale_if_unmodified_since_is_412() {
    let fx = fixture();
    let res = send(
        &fx.router,
        get("/file/test.txt")
            .header("if-unmodified-since", "Sun, 14 Jan 2024 12:00:00 GMT")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::PRECONDITION_FAILED);
    assert_eq!(text_body(res).await, "Precondition Failed");

    let res = send(
        &fx.router,
        get("/file/test.txt")
            .header("if-unmodified-since", "Mon, 15 Jan 2024 12:00:00 GMT")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn head_has_length_but_no_body() {
    let fx = fixture();
    let res = send(
        &fx.router,
        Request::builder().method("HEAD").uri("/file/test.txt").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-length"], "3");
    assert!(body_bytes(res).await.is_empty());
}

#[tokio::test]
async fn legacy_upload_path_serves_files() {
    let fx = fixture();
    let res = send(&fx.router, get("/upload/test3.txt").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn missing_auth_is_401() {
    let fx = fixture();
    for request in [
        get("/files/list").header("x-auth-key", "invalid").body(Body::empty()).unwrap(),
        get("/delete?filename=test.txt").body(Body::empty()).unwrap(),
        Request::builder().method("POST").uri("/upload").body(Body::from("abc")).unwrap(),
    ] {
        let res = send(&fx.router, request).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await, json!({"success": false, "error": "Missing auth"}));
    }
    assert_eq!(fx.store.len(), 3);
}

#[tokio::test]
async fn upload_without_headers_is_400() {
    let fx = fixture();
    let res = send(
        &fx.router,
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header("x-auth-key", "test")
            .body(Body::from("abc"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(res).await,
        json!({"success": false, "message": "content-length and content-type are required"})
    );
}

fn upload_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-auth-key", "test")
        .header("content-length", "4")
        .header("content-type", "text/plain")
        .body(Body::from("test"))
        .unwrap()
}

#[tokio::test]
async fn upload_returns_urls_and_file_is_retrievable() {
    let fx = fixture();
    let folder = Utc::now().format("%Y/%m").to_string();

    let res = send(&fx.router, upload_request("https://i.example.com/upload?filename=test-upload")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["image"], format!("https://i.example.com/file/{folder}/test-upload"));
    assert_eq!(
        body["deleteUrl"],
        format!(
            "https://i.example.com/delete?filename={}%2Ftest-upload&authkey=test",
            folder.replace('/', "%2F")
        )
    );

    let res = send(
        &fx.router,
        get(&format!("/file/{folder}/test-upload")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "text/plain");
    assert_eq!(res.headers()["cache-control"], "public, max-age=604800");
    assert_eq!(text_body(res).await, "test");
}

#[tokio::test]
async fn upload_with_bogus_content_length_is_stored() {
    let fx = fixture();
    for length in ["18446744073709551615", "1000000000000"] {
        let request = Request::builder()
            .method("POST")
            .uri("https://i.example.com/upload?filename=huge")
            .header("x-auth-key", "test")
            .header("content-length", length)
            .header("content-type", "text/plain")
            .body(Body::from("test"))
            .unwrap();
        let res = tokio::spawn(fx.router.clone().oneshot(request))
            .await
            .expect("upload handler must not panic")
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{length}");
        assert_eq!(json_body(res).await["success"], true);
    }
    assert_eq!(fx.store.len(), 4);
}

#[tokio::test]
async fn upload_without_filename_gets_random_slug() {
    let fx = fixture();
    let res = send(
        &fx.router,
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header("host", "i.example.com")
            .header("x-auth-key", "test")
            .header("content-length", "4")
            .header("content-type", "text/plain")
            .body(Body::from("test"))
            .unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let image = json_body(res).await["image"].as_str().unwrap().to_string();
    assert!(image.starts_with("https://i.example.com/file/"));
    assert_eq!(fx.store.len(), 4);
}

#[tokio::test]
async fn upload_with_custom_public_domain() {
    let fx = fixture_with(SnapConfig::new("test").with_custom_public_bucket_domain("cdn.example.com"));
    let folder = Utc::now().format("%Y/%m").to_string();

    let res = send(&fx.router, upload_request("https://i.example.com/upload?filename=test-upload")).await;
    let body = json_body(res).await;
    assert_eq!(body["image"], format!("https://cdn.example.com/{folder}/test-upload"));
    assert!(body["deleteUrl"]
        .as_str()
        .unwrap()
        .starts_with("https://i.example.com/delete?"));
}

#[tokio::test]
async fn public_only_mode_hides_files() {
    let fx = fixture_with(SnapConfig::new("test").only_allow_public_bucket(true));
    let res = send(&fx.router, get("/file/test.txt").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await, json!({"success": false, "error": "Not Found"}));
}

#[tokio::test]
async fn empty_file_id_is_missing_id() {
    let fx = fixture();
    let res = send(&fx.router, get("/file/").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await, json!({"success": false, "error": "Missing ID"}));
}

#[tokio::test]
async fn delete_without_filename_is_404() {
    let fx = fixture();
    let res = send(
        &fx.router,
        get("/delete").header("x-auth-key", "test").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await, json!({"success": false, "error": "Missing filename"}));
}

#[tokio::test]
async fn unknown_routes_and_methods_are_json_404() {
    let fx = fixture();
    for request in [
        get("/nope").body(Body::empty()).unwrap(),
        get("/upload").header("x-auth-key", "test").body(Body::empty()).unwrap(),
        Request::builder().method("POST").uri("/file/test.txt").body(Body::empty()).unwrap(),
    ] {
        let res = send(&fx.router, request).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(res).await, json!({"success": false, "error": "Not Found"}));
    }
}

#[tokio::test]
async fn request_id_is_preserved_when_provided() {
    let fx = fixture();
    let provided = HeaderValue::from_static("req-test-123");
    let res = send(
        &fx.router,
        get("/health").header("x-request-id", provided.clone()).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
    assert_eq!(text_body(res).await, "ok");
}

struct UnavailableStore;

fn unavailable() -> BlobError {
    BlobError::backend(std::io::Error::other("bucket unavailable"))
}

#[async_trait::async_trait]
impl BlobStore for UnavailableStore {
    async fn head(&self, _key: &str) -> BlobResult<Option<BlobMetadata>> {
        Err(unavailable())
    }

    async fn get(&self, _key: &str, _options: GetOptions) -> BlobResult<GetOutcome> {
        Err(unavailable())
    }

    async fn put(&self, _key: &str, _stream: ByteStream, _put: BlobPut) -> BlobResult<BlobMetadata> {
        Err(unavailable())
    }

    async fn delete(&self, _key: &str) -> BlobResult<()> {
        Err(unavailable())
    }

    async fn list(&self, _options: ListOptions) -> BlobResult<ListResult> {
        Err(unavailable())
    }
}

#[tokio::test]
async fn store_failures_are_500_with_upstream_error() {
    let state = SnapState::new(SnapConfig::new("test"), Arc::new(UnavailableStore));
    let router = build_router(state);

    let res = send(&router, upload_request("/upload?filename=x")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(res).await,
        json!({
            "success": false,
            "message": "Error occured writing to R2",
            "error": {"name": "BackendError", "message": "bucket unavailable"}
        })
    );

    let res = send(
        &router,
        get("/delete?filename=x").header("x-auth-key", "test").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(res).await["message"], "Error occurred deleting from R2");
}
