//! Uploads into the local store and range-aware downloads from `/files`.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use common::{body_bytes, body_json, get, multipart_file, post_multipart, PNG_BASE64};
use sqlx::PgPool;
use tower::ServiceExt;

fn png() -> Vec<u8> {
    BASE64.decode(PNG_BASE64).unwrap()
}

async fn upload_png(app: Router) -> serde_json::Value {
    let (content_type, body) = multipart_file("Red Fox.png", "image/png", &png());
    let response = post_multipart(app, "/api/v1/uploads", content_type, body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

async fn get_range(app: Router, uri: &str, range: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("range", range)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_upload_image_describes_file(pool: PgPool) {
    let app = common::build_test_app(pool);
    let uploaded = upload_png(app).await;

    assert_eq!(uploaded["media_type"], "image");
    assert_eq!(uploaded["mime_type"], "image/png");
    assert_eq!(uploaded["size"], png().len());
    assert_eq!(uploaded["width"], 1);
    assert_eq!(uploaded["height"], 1);
    let key = uploaded["key"].as_str().unwrap();
    assert!(key.starts_with("uploads/user-with-settings/"), "{key}");
    assert!(!key.contains(' '));
    assert_eq!(uploaded["url"], format!("/api/v1/files/{key}"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_upload_rejects_unsupported_type(pool: PgPool) {
    let app = common::build_test_app(pool);
    let (content_type, body) = multipart_file("notes.txt", "text/plain", b"hello");
    let response = post_multipart(app, "/api/v1/uploads", content_type, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_upload_rejects_empty_file(pool: PgPool) {
    let app = common::build_test_app(pool);
    let (content_type, body) = multipart_file("empty.png", "image/png", b"");
    let response = post_multipart(app, "/api/v1/uploads", content_type, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Downloads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_download_full_file(pool: PgPool) {
    let app = common::build_test_app(pool);
    let uploaded = upload_png(app.clone()).await;

    let response = get(app, uploaded["url"].as_str().unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.headers()["accept-ranges"], "bytes");
    assert_eq!(body_bytes(response).await, png());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_download_byte_range(pool: PgPool) {
    let app = common::build_test_app(pool);
    let uploaded = upload_png(app.clone()).await;
    let url = uploaded["url"].as_str().unwrap();
    let total = png().len();

    let response = get_range(app.clone(), url, "bytes=0-7").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers()["content-range"],
        format!("bytes 0-7/{total}").as_str()
    );
    assert_eq!(body_bytes(response).await, png()[..8].to_vec());

    let response = get_range(app, url, &format!("bytes={}-", total + 10)).await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        response.headers()["content-range"],
        format!("bytes */{total}").as_str()
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_missing_file_is_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/files/uploads/nobody/missing.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_path_traversal_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/files/uploads/..%2F..%2Fetc%2Fpasswd").await;
    assert!(
        matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND
        ),
        "got {}",
        response.status()
    );
}
