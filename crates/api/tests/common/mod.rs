#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get as route_get, post, put};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use engui_api::config::ServerConfig;
use engui_api::middleware::user::USER_ID_HEADER;
use engui_api::router::build_app_router;
use engui_api::state::AppState;

/// API key the RunPod mock accepts.
pub const RUNPOD_KEY: &str = "rp_test_key";

/// Endpoint id on the mock that fails every submission.
pub const BROKEN_ENDPOINT: &str = "broken";

/// A 1x1 transparent PNG.
pub const PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Fresh storage directory under the system temp dir.
pub fn temp_storage_dir() -> PathBuf {
    std::env::temp_dir().join(format!("engui-api-tests-{}", uuid::Uuid::new_v4()))
}

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin, a private storage
/// directory and no server-wide RunPod key.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        storage_dir: temp_storage_dir(),
        encryption_key: "integration-test-key".to_string(),
        runpod_api_base: "http://127.0.0.1:9".to_string(),
        runpod_api_key: None,
        job_poll_interval_secs: 1,
        max_upload_bytes: 10 * 1024 * 1024,
        default_user_id: "user-with-settings".to_string(),
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool and the default test config.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, test_config())
}

/// Same as [`build_test_app`] with a caller-supplied config.
pub fn build_test_app_with(pool: PgPool, config: ServerConfig) -> Router {
    build_test_app_and_state(pool, config).0
}

/// The router together with the state behind it, for tests that also
/// drive background work directly.
pub fn build_test_app_and_state(pool: PgPool, config: ServerConfig) -> (Router, AppState) {
    let state = AppState::new(pool, config.clone()).expect("test state");
    (build_app_router(state.clone(), &config), state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_as(app: Router, user: &str, uri: &str) -> Response {
    send(app, Method::GET, uri, Some(user), None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_as(app: Router, user: &str, uri: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(user), Some(body)).await
}

pub async fn post_empty(app: Router, uri: &str) -> Response {
    send(app, Method::POST, uri, None, None).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, Method::PUT, uri, None, Some(body)).await
}

pub async fn patch_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, Method::PATCH, uri, None, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None, None).await
}

pub async fn delete_as(app: Router, user: &str, uri: &str) -> Response {
    send(app, Method::DELETE, uri, Some(user), None).await
}

/// Multipart body with a single `file` part.
pub fn multipart_file(file_name: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "engui-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

pub async fn post_multipart(app: Router, uri: &str, content_type: String, body: Vec<u8>) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Store the mock's API key and an endpoint for `flux-krea` in the
/// default user's settings.
pub async fn configure_runpod(app: Router, endpoint: &str) {
    let response = put_json(
        app,
        "/api/v1/settings",
        json!({
            "settings": [
                { "service": "runpod", "key": "api_key", "value": RUNPOD_KEY },
                { "service": "runpod", "key": "endpoint_flux_krea", "value": endpoint }
            ]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// RunPod mock
// ---------------------------------------------------------------------------

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {RUNPOD_KEY}"))
}

async fn mock_run(
    Path(endpoint): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if !authorized(&headers) {
        return Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized" }))));
    }
    if endpoint == BROKEN_ENDPOINT {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "worker pool exhausted" })),
        ));
    }
    if !body["input"].is_object() {
        return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "missing input" }))));
    }
    let id = format!("rp-{}", uuid::Uuid::new_v4().simple());
    Ok(Json(json!({ "id": id, "status": "IN_QUEUE" })))
}

async fn mock_status(Path((_endpoint, id)): Path<(String, String)>) -> Json<Value> {
    Json(json!({
        "id": id,
        "status": "COMPLETED",
        "executionTime": 2500,
        "delayTime": 120,
        "output": { "image": format!("data:image/png;base64,{PNG_BASE64}") }
    }))
}

async fn mock_health(Path(endpoint): Path<String>) -> Result<Json<Value>, StatusCode> {
    if endpoint == BROKEN_ENDPOINT {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(json!({ "workers": { "idle": 1, "running": 0 } })))
}

/// Start an in-process RunPod serverless API and return its base URL.
///
/// Every submitted job completes immediately with a PNG image after 2.5 s
/// of billed execution time. The [`BROKEN_ENDPOINT`] rejects submissions
/// and reports itself unhealthy.
pub async fn spawn_runpod_mock() -> String {
    let app = Router::new()
        .route("/{endpoint}/run", post(mock_run))
        .route("/{endpoint}/status/{id}", route_get(mock_status))
        .route(
            "/{endpoint}/cancel/{id}",
            post(|Path((_e, id)): Path<(String, String)>| async move {
                Json(json!({ "id": id, "status": "CANCELLED" }))
            }),
        )
        .route("/{endpoint}/health", route_get(mock_health));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Test config pointing at a running RunPod mock.
pub async fn config_with_runpod() -> ServerConfig {
    ServerConfig {
        runpod_api_base: spawn_runpod_mock().await,
        ..test_config()
    }
}

// ---------------------------------------------------------------------------
// S3 mock
// ---------------------------------------------------------------------------

/// Bucket name the S3 helpers configure.
pub const S3_BUCKET: &str = "media";

/// Handle on the objects held by a running S3 mock, keyed by
/// `{bucket}/{key}`.
#[derive(Clone, Default)]
pub struct S3Mock {
    pub endpoint: String,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    puts: Arc<AtomicUsize>,
}

impl S3Mock {
    /// URL prefix of objects in [`S3_BUCKET`] with path-style addressing.
    pub fn object_base(&self) -> String {
        format!("{}/{S3_BUCKET}/", self.endpoint)
    }

    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{S3_BUCKET}/{key}"), bytes);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&format!("{S3_BUCKET}/{key}"))
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Number of PUT requests served so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

/// Strip `aws-chunked` framing (`<hex size>[;ext]\r\n<data>\r\n ... 0\r\n`)
/// from a streamed upload body.
fn decode_aws_chunked(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut rest = body;
    while let Some(line_end) = rest.windows(2).position(|w| w == b"\r\n") {
        let header = String::from_utf8_lossy(&rest[..line_end]);
        let size_hex = header.split(';').next().unwrap_or("").trim();
        let Ok(size) = usize::from_str_radix(size_hex, 16) else {
            break;
        };
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        out.extend_from_slice(&rest[start..start + size]);
        rest = &rest[(start + size + 2).min(rest.len())..];
    }
    out
}

async fn s3_put(
    State(mock): State<S3Mock>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let chunked = headers
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("aws-chunked"));
    let bytes = if chunked {
        decode_aws_chunked(&body)
    } else {
        body.to_vec()
    };
    mock.objects
        .lock()
        .unwrap()
        .insert(format!("{bucket}/{key}"), bytes);
    mock.puts.fetch_add(1, Ordering::SeqCst);
    (StatusCode::OK, [("etag", "\"0123456789abcdef\"")]).into_response()
}

/// Serves both GET and HEAD.
async fn s3_get(
    State(mock): State<S3Mock>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    let object = mock
        .objects
        .lock()
        .unwrap()
        .get(&format!("{bucket}/{key}"))
        .cloned();
    match object {
        Some(bytes) => (
            StatusCode::OK,
            [
                ("content-length", bytes.len().to_string()),
                ("content-type", "application/octet-stream".to_string()),
                ("etag", "\"0123456789abcdef\"".to_string()),
            ],
            bytes,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start an in-process, path-style S3 API that keeps objects in memory.
///
/// Only object PUT, GET and HEAD are implemented, and requests are not
/// authenticated.
pub async fn spawn_s3_mock() -> S3Mock {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mock = S3Mock {
        endpoint: format!("http://{}", listener.local_addr().unwrap()),
        ..Default::default()
    };
    let app = Router::new()
        .route("/{bucket}/{*key}", put(s3_put).get(s3_get))
        .with_state(mock.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    mock
}

/// Point the default user's `s3` settings at a running mock.
pub async fn configure_s3(app: Router, mock: &S3Mock) {
    let response = put_json(
        app,
        "/api/v1/settings",
        json!({
            "settings": [
                { "service": "s3", "key": "endpoint_url", "value": mock.endpoint },
                { "service": "s3", "key": "bucket", "value": S3_BUCKET },
                { "service": "s3", "key": "access_key_id", "value": "AKIDTEST" },
                { "service": "s3", "key": "secret_access_key", "value": "secret-test-key" },
                { "service": "s3", "key": "force_path_style", "value": "true" }
            ]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}
