//! The model catalog endpoint.

mod common;

use axum::http::StatusCode;
use common::{body_json, get};
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_models_returns_catalog(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/models").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let models = json["data"].as_array().unwrap();
    let ids: Vec<&str> = models.iter().map(|m| m["id"].as_str().unwrap()).collect();
    for id in ["flux-krea", "qwen-image-edit", "wan22", "infinite-talk", "video-upscale", "mmaudio"] {
        assert!(ids.contains(&id), "missing {id}");
    }

    let flux = models.iter().find(|m| m["id"] == "flux-krea").unwrap();
    assert_eq!(flux["output"], "image");
    assert_eq!(flux["requires_prompt"], true);
    assert!(flux["defaults"].is_object());
}
