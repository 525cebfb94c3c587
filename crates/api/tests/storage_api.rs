//! Storage, LoRA and media endpoints, including migration of local
//! results into an in-process S3 mock and frame extraction with ffmpeg.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{body_bytes, body_json, configure_runpod, configure_s3, get, post_empty, post_json};
use serde_json::{json, Value};
use sqlx::PgPool;

const MISSING_URL: &str = "/api/v1/files/results/user-with-settings/gone.png";

/// Complete one `flux-krea` job against the RunPod mock; its result is
/// stored locally because no bucket is configured yet.
async fn completed_local_job(app: Router) -> Value {
    configure_runpod(app.clone(), "flux-ep").await;
    let created = body_json(
        post_json(
            app.clone(),
            "/api/v1/jobs",
            json!({ "model_id": "flux-krea", "prompt": "a lighthouse" }),
        )
        .await,
    )
    .await;
    let id = created["data"]["id"].as_i64().unwrap();
    let job = body_json(post_empty(app, &format!("/api/v1/jobs/{id}/refresh")).await).await;
    assert_eq!(job["data"]["status"], "completed");
    job["data"].clone()
}

async fn default_workspace_id(app: Router) -> i64 {
    let workspaces = body_json(get(app, "/api/v1/workspaces").await).await;
    workspaces["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|w| w["is_default"] == true)
        .unwrap()["id"]
        .as_i64()
        .unwrap()
}

async fn media_urls(app: Router, workspace_id: i64) -> Vec<String> {
    let media = body_json(get(app, &format!("/api/v1/workspaces/{workspace_id}/media")).await).await;
    let mut urls: Vec<String> = media["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["url"].as_str().unwrap().to_string())
        .collect();
    urls.sort();
    urls
}

async fn job_result_url(app: Router, id: i64) -> String {
    let job = body_json(get(app, &format!("/api/v1/jobs/{id}")).await).await;
    job["data"]["result_url"].as_str().unwrap().to_string()
}

async fn assert_not_configured(response: axum::response::Response) {
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "NOT_CONFIGURED");
}

// ---------------------------------------------------------------------------
// S3-backed endpoints without a bucket
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bucket_endpoints_require_s3_settings(pool: PgPool) {
    let app = common::build_test_app(pool);

    assert_not_configured(get(app.clone(), "/api/v1/storage/objects").await).await;
    assert_not_configured(get(app.clone(), "/api/v1/storage/presign?key=uploads/a.png").await).await;
    assert_not_configured(post_empty(app.clone(), "/api/v1/storage/migrate").await).await;
    assert_not_configured(post_empty(app, "/api/v1/loras/sync").await).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_incomplete_s3_settings_are_not_configured(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = common::put_json(
        app.clone(),
        "/api/v1/settings",
        json!({ "settings": [{ "service": "s3", "key": "bucket", "value": "engui-media" }] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(app, "/api/v1/storage/objects").await;
    assert_not_configured(response).await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unsafe_object_keys_are_rejected(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app.clone(), "/api/v1/storage/presign?key=../secrets.txt").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let response = common::delete(app, "/api/v1/storage/objects?key=/etc/passwd").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lora_listing_works_without_bucket(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app.clone(), "/api/v1/loras").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!([]));

    let response = get(app, "/api/v1/loras/999999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Migration to S3
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_migration_dry_run_changes_nothing(pool: PgPool) {
    let app = common::build_test_app_with(pool, common::config_with_runpod().await);
    let job = completed_local_job(app.clone()).await;
    let job_id = job["id"].as_i64().unwrap();
    let local_url = job["result_url"].as_str().unwrap().to_string();

    let ws = default_workspace_id(app.clone()).await;
    let response = post_json(
        app.clone(),
        &format!("/api/v1/workspaces/{ws}/media"),
        json!({ "media_type": "image", "url": MISSING_URL }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let s3 = common::spawn_s3_mock().await;
    configure_s3(app.clone(), &s3).await;

    let response = post_json(app.clone(), "/api/v1/storage/migrate", json!({ "dry_run": true })).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await["data"].clone();
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["migrated"], 1);
    assert_eq!(report["skipped"], 1);
    assert_eq!(report["failed"], 0);

    assert_eq!(s3.object_count(), 0);
    assert_eq!(s3.put_count(), 0);
    assert_eq!(job_result_url(app.clone(), job_id).await, local_url);
    let mut expected = vec![local_url, MISSING_URL.to_string()];
    expected.sort();
    assert_eq!(media_urls(app, ws).await, expected);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_migration_uploads_and_rewrites_urls(pool: PgPool) {
    let app = common::build_test_app_with(pool, common::config_with_runpod().await);
    let job = completed_local_job(app.clone()).await;
    let job_id = job["id"].as_i64().unwrap();
    let local_url = job["result_url"].as_str().unwrap().to_string();
    let key = local_url.strip_prefix("/api/v1/files/").unwrap().to_string();

    let ws = default_workspace_id(app.clone()).await;
    post_json(
        app.clone(),
        &format!("/api/v1/workspaces/{ws}/media"),
        json!({ "media_type": "image", "url": MISSING_URL }),
    )
    .await;

    let s3 = common::spawn_s3_mock().await;
    configure_s3(app.clone(), &s3).await;

    let report = body_json(post_empty(app.clone(), "/api/v1/storage/migrate").await).await["data"].clone();
    assert_eq!(report["dry_run"], false);
    assert_eq!(report["migrated"], 1);
    assert_eq!(report["already_present"], 0);
    assert_eq!(report["skipped"], 1);
    assert_eq!(report["failed"], 0, "{report}");

    // The job result and the workspace item sharing it were uploaded once.
    assert!(s3.contains(&key));
    assert_eq!(s3.put_count(), 1);
    let s3_url = format!("{}{key}", s3.object_base());
    assert_eq!(job_result_url(app.clone(), job_id).await, s3_url);
    let mut expected = vec![s3_url, MISSING_URL.to_string()];
    expected.sort();
    assert_eq!(media_urls(app.clone(), ws).await, expected);

    // Only the missing file is still local on a second run.
    let again = body_json(post_empty(app, "/api/v1/storage/migrate").await).await["data"].clone();
    assert_eq!(again["migrated"], 0);
    assert_eq!(again["skipped"], 1);
    assert_eq!(s3.put_count(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_migration_skips_upload_of_objects_already_in_bucket(pool: PgPool) {
    let app = common::build_test_app_with(pool, common::config_with_runpod().await);
    let job = completed_local_job(app.clone()).await;
    let job_id = job["id"].as_i64().unwrap();
    let local_url = job["result_url"].as_str().unwrap().to_string();
    let key = local_url.strip_prefix("/api/v1/files/").unwrap().to_string();
    let local_bytes = body_bytes(get(app.clone(), &local_url).await).await;

    let s3 = common::spawn_s3_mock().await;
    s3.insert(&key, vec![0; local_bytes.len()]);
    configure_s3(app.clone(), &s3).await;

    let report = body_json(post_empty(app.clone(), "/api/v1/storage/migrate").await).await["data"].clone();
    assert_eq!(report["migrated"], 1);
    assert_eq!(report["already_present"], 1);
    assert_eq!(s3.put_count(), 0);
    assert_eq!(
        job_result_url(app, job_id).await,
        format!("{}{key}", s3.object_base())
    );
}

// ---------------------------------------------------------------------------
// Media tools
// ---------------------------------------------------------------------------

fn ffmpeg_available() -> bool {
    ["ffmpeg", "ffprobe"].iter().all(|tool| {
        std::process::Command::new(tool)
            .arg("-version")
            .output()
            .is_ok_and(|o| o.status.success())
    })
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_frame_extraction_writes_thumbnail(pool: PgPool) {
    if !ffmpeg_available() {
        eprintln!("ffmpeg/ffprobe not installed, skipping frame extraction test");
        return;
    }
    let config = common::test_config();
    let clip_dir = config.storage_dir.join("uploads/user-with-settings");
    std::fs::create_dir_all(&clip_dir).unwrap();
    let status = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-f", "lavfi", "-i", "testsrc=size=64x48:rate=10"])
        .args(["-t", "1", "-c:v", "mpeg4", "-pix_fmt", "yuv420p", "-y"])
        .arg(clip_dir.join("clip.mp4"))
        .status()
        .unwrap();
    assert!(status.success());
    let app = common::build_test_app_with(pool, config);

    let response = post_json(
        app.clone(),
        "/api/v1/media/frames",
        json!({
            "key": "uploads/user-with-settings/clip.mp4",
            "frame": { "position": "last" },
            "width": 32
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let thumb = body_json(response).await["data"].clone();
    let key = thumb["key"].as_str().unwrap();
    assert!(key.ends_with("clip_last.jpg"), "{key}");
    assert_eq!(thumb["url"], format!("/api/v1/files/{key}"));
    assert_eq!(thumb["width"], 32);
    assert_eq!(thumb["height"], 24);
    assert!(thumb["timestamp_secs"].as_f64().unwrap() > 0.5);

    let response = get(app.clone(), thumb["url"].as_str().unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/jpeg");

    let response = post_json(
        app,
        "/api/v1/media/probe",
        json!({ "url": "/api/v1/files/uploads/user-with-settings/clip.mp4" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_frame_extraction_validates_source(pool: PgPool) {
    let app = common::build_test_app(pool);

    let response = post_json(
        app.clone(),
        "/api/v1/media/frames",
        json!({ "url": "https://cdn.example.com/clip.mp4" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(
        app.clone(),
        "/api/v1/media/frames",
        json!({ "key": "uploads/user-with-settings/missing.mp4", "frame": { "position": "last" } }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_json(
        app.clone(),
        "/api/v1/media/frames",
        json!({ "key": "uploads/user-with-settings/missing.mp4", "width": 0 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(app, "/api/v1/media/probe", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
