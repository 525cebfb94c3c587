//! Integration tests for the repository layer against a real database.
//!
//! - Job lifecycle and terminal-status guards
//! - Default workspace creation and switching
//! - Workspace media scoping and job de-duplication
//! - Unique constraints on presets, atomic settings batches, LoRA sync
//! - Credit charges and summaries
//! - Video project storage

use assert_matches::assert_matches;
use engui_core::video_project::VideoProjectDoc;
use engui_db::models::job::{JobCompletion, JobListQuery, NewJob};
use engui_db::models::lora::NewLora;
use engui_db::models::preset::{CreatePreset, UpdatePreset};
use engui_db::models::user_setting::SettingWrite;
use engui_db::models::status::JobStatus;
use engui_db::models::video_project::VideoProjectListQuery;
use engui_db::models::workspace::{
    CreateWorkspace, CreateWorkspaceMedia, UpdateWorkspace, WorkspaceMediaQuery,
};
use engui_db::repositories::{
    CreditRepo, JobRepo, LoraRepo, PresetRepo, UserSettingRepo, VideoProjectRepo,
    WorkspaceMediaRepo, WorkspaceRepo,
};
use serde_json::json;
use sqlx::PgPool;

const USER: &str = "user-a";
const OTHER: &str = "user-b";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_job(pool: &PgPool, user: &str, model_id: &str) -> engui_db::models::job::Job {
    let options = json!({ "seed": 42 });
    let inputs = json!({ "image": "uploads/a.png" });
    JobRepo::create(
        pool,
        &NewJob {
            user_id: user,
            workspace_id: None,
            model_id,
            media_type: "image",
            endpoint_id: Some("ep-1"),
            prompt: Some("a cat"),
            options: &options,
            input_files: &inputs,
            retry_of_job_id: None,
        },
    )
    .await
    .unwrap()
}

fn media(url: &str, job_id: Option<i64>) -> CreateWorkspaceMedia {
    CreateWorkspaceMedia {
        job_id,
        media_type: "image".to_string(),
        url: url.to_string(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_job_lifecycle(pool: PgPool) {
    let job = new_job(&pool, USER, "flux-krea").await;
    assert_eq!(job.status, "pending");
    assert_eq!(job.status_id, JobStatus::Pending.id());
    assert_eq!(job.inputs().image.as_deref(), Some("uploads/a.png"));

    let queued = JobRepo::mark_queued(&pool, job.id, "rp-123").await.unwrap().unwrap();
    assert_eq!(queued.status, "queued");
    assert_eq!(queued.runpod_job_id.as_deref(), Some("rp-123"));

    assert!(JobRepo::set_status(&pool, job.id, JobStatus::Processing).await.unwrap());
    // Same status again is a no-op.
    assert!(!JobRepo::set_status(&pool, job.id, JobStatus::Processing).await.unwrap());

    let done = JobRepo::complete(
        &pool,
        job.id,
        &JobCompletion {
            result_url: Some("/api/v1/files/results/u/job_1.png".into()),
            execution_time_ms: Some(1500),
            cost: Some(0.00066),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(done.status, "completed");
    assert!(done.completed_at.is_some());
    assert_eq!(done.execution_time_ms, Some(1500));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_terminal_jobs_are_not_overwritten(pool: PgPool) {
    let job = new_job(&pool, USER, "flux-krea").await;
    let cancelled = JobRepo::cancel(&pool, job.id).await.unwrap();
    assert_matches!(cancelled, Some(ref j) if j.status == "cancelled");

    assert!(JobRepo::cancel(&pool, job.id).await.unwrap().is_none());
    assert!(JobRepo::fail(&pool, job.id, "late", None).await.unwrap().is_none());
    assert!(JobRepo::complete(&pool, job.id, &JobCompletion::default())
        .await
        .unwrap()
        .is_none());
    assert!(!JobRepo::set_status(&pool, job.id, JobStatus::Processing).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_job_list_filters_and_ownership(pool: PgPool) {
    let a = new_job(&pool, USER, "flux-krea").await;
    let b = new_job(&pool, USER, "wan22").await;
    new_job(&pool, OTHER, "flux-krea").await;
    JobRepo::fail(&pool, b.id, "boom", None).await.unwrap();

    let all = JobRepo::list(&pool, USER, &JobListQuery::default()).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, b.id, "newest first");

    let failed = JobRepo::list(
        &pool,
        USER,
        &JobListQuery {
            status: Some("failed".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_message.as_deref(), Some("boom"));

    let flux = JobRepo::list(
        &pool,
        USER,
        &JobListQuery {
            model_id: Some("flux-krea".into()),
            limit: Some(1),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(flux.len(), 1);
    assert_eq!(flux[0].id, a.id);

    assert!(JobRepo::find_for_user(&pool, a.id, OTHER).await.unwrap().is_none());
    assert!(!JobRepo::delete(&pool, a.id, OTHER).await.unwrap());
    assert!(JobRepo::delete(&pool, a.id, USER).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_active_and_clear_history(pool: PgPool) {
    let pending = new_job(&pool, USER, "flux-krea").await;
    let queued = new_job(&pool, USER, "flux-krea").await;
    JobRepo::mark_queued(&pool, queued.id, "rp-9").await.unwrap();
    let failed = new_job(&pool, USER, "flux-krea").await;
    JobRepo::fail(&pool, failed.id, "x", None).await.unwrap();

    let active = JobRepo::list_active(&pool, 10).await.unwrap();
    let ids: Vec<i64> = active.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![queued.id], "pending jobs without a RunPod id are not polled");

    let removed = JobRepo::clear_history(&pool, USER, &[JobStatus::Failed, JobStatus::Completed])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(JobRepo::find_by_id(&pool, pending.id).await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_default_workspace_created_once(pool: PgPool) {
    let first = WorkspaceRepo::get_or_create_default(&pool, USER).await.unwrap();
    let second = WorkspaceRepo::get_or_create_default(&pool, USER).await.unwrap();
    assert_eq!(first.id, second.id);
    assert!(first.is_default);
    assert_eq!(first.name, "Default");

    let other = WorkspaceRepo::get_or_create_default(&pool, OTHER).await.unwrap();
    assert_ne!(other.id, first.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_existing_default_name_is_promoted(pool: PgPool) {
    let named = WorkspaceRepo::create(
        &pool,
        USER,
        &CreateWorkspace {
            name: "Default".into(),
            description: None,
        },
    )
    .await
    .unwrap();
    assert!(!named.is_default);

    let default = WorkspaceRepo::get_or_create_default(&pool, USER).await.unwrap();
    assert_eq!(default.id, named.id);
    assert!(default.is_default);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_set_default_moves_flag(pool: PgPool) {
    let original = WorkspaceRepo::get_or_create_default(&pool, USER).await.unwrap();
    let studio = WorkspaceRepo::create(
        &pool,
        USER,
        &CreateWorkspace {
            name: "Studio".into(),
            description: Some("client work".into()),
        },
    )
    .await
    .unwrap();

    let switched = WorkspaceRepo::set_default(&pool, studio.id, USER).await.unwrap().unwrap();
    assert!(switched.is_default);

    let refreshed = WorkspaceRepo::find_for_user(&pool, original.id, USER).await.unwrap().unwrap();
    assert!(!refreshed.is_default);

    assert!(WorkspaceRepo::set_default(&pool, studio.id, OTHER).await.unwrap().is_none());
    // Default workspace cannot be deleted; the former default can.
    assert!(!WorkspaceRepo::delete(&pool, studio.id, USER).await.unwrap());
    assert!(WorkspaceRepo::delete(&pool, original.id, USER).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_workspace_name_unique_per_user(pool: PgPool) {
    let input = CreateWorkspace {
        name: "Shots".into(),
        description: None,
    };
    WorkspaceRepo::create(&pool, USER, &input).await.unwrap();
    let err = WorkspaceRepo::create(&pool, USER, &input).await.unwrap_err();
    assert_matches!(err, sqlx::Error::Database(ref db) if db.constraint() == Some("uq_workspaces_user_name"));
    // Different user, same name is fine.
    WorkspaceRepo::create(&pool, OTHER, &input).await.unwrap();

    let renamed = WorkspaceRepo::update(
        &pool,
        WorkspaceRepo::get_or_create_default(&pool, USER).await.unwrap().id,
        USER,
        &UpdateWorkspace {
            name: None,
            description: Some("main".into()),
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(renamed.name, "Default");
    assert_eq!(renamed.description.as_deref(), Some("main"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_workspace_media_crud_and_counts(pool: PgPool) {
    let ws = WorkspaceRepo::get_or_create_default(&pool, USER).await.unwrap();
    let other_ws = WorkspaceRepo::create(
        &pool,
        USER,
        &CreateWorkspace {
            name: "Archive".into(),
            description: None,
        },
    )
    .await
    .unwrap();
    let job = new_job(&pool, USER, "flux-krea").await;

    let item = WorkspaceMediaRepo::create_for_job(&pool, ws.id, &media("/a.png", Some(job.id)))
        .await
        .unwrap()
        .unwrap();
    let dup = WorkspaceMediaRepo::create_for_job(&pool, ws.id, &media("/a.png", Some(job.id)))
        .await
        .unwrap();
    assert!(dup.is_none(), "a job is added to a workspace once");
    WorkspaceMediaRepo::create(&pool, ws.id, &media("/b.png", None)).await.unwrap();

    let fav = WorkspaceMediaRepo::update(&pool, ws.id, item.id, Some(true), None)
        .await
        .unwrap()
        .unwrap();
    assert!(fav.is_favorite);

    let favorites = WorkspaceMediaRepo::list(
        &pool,
        ws.id,
        &WorkspaceMediaQuery {
            favorites_only: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(favorites.len(), 1);

    let summaries = WorkspaceRepo::list_with_counts(&pool, USER).await.unwrap();
    assert_eq!(summaries[0].id, ws.id, "default first");
    assert_eq!(summaries[0].media_count, 2);

    let moved = WorkspaceMediaRepo::update(&pool, ws.id, item.id, None, Some(other_ws.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.workspace_id, other_ws.id);
    assert!(WorkspaceMediaRepo::find(&pool, ws.id, item.id).await.unwrap().is_none());

    // Deleting a workspace cascades to its media.
    assert!(WorkspaceRepo::delete(&pool, other_ws.id, USER).await.unwrap());
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workspace_media WHERE id = $1")
        .bind(item.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_url_prefix_lookups(pool: PgPool) {
    let ws = WorkspaceRepo::get_or_create_default(&pool, USER).await.unwrap();
    let job = new_job(&pool, USER, "flux-krea").await;
    JobRepo::update_urls(&pool, job.id, Some("/api/v1/files/results/u/x.png"), None)
        .await
        .unwrap();
    WorkspaceMediaRepo::create(&pool, ws.id, &media("/api/v1/files/results/u/x.png", None))
        .await
        .unwrap();
    WorkspaceMediaRepo::create(&pool, ws.id, &media("https://cdn/x.png", None))
        .await
        .unwrap();

    let jobs = JobRepo::list_with_url_prefix(&pool, USER, "/api/v1/files/").await.unwrap();
    assert_eq!(jobs.len(), 1);
    let items = WorkspaceMediaRepo::list_with_url_prefix(&pool, USER, "/api/v1/files/")
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert!(WorkspaceMediaRepo::list_with_url_prefix(&pool, OTHER, "/api/v1/files/")
        .await
        .unwrap()
        .is_empty());
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_preset_crud_and_usage(pool: PgPool) {
    let input = CreatePreset {
        name: "  Portrait ".into(),
        model_id: "flux-krea".into(),
        description: None,
        parameters: json!({ "steps": 30 }),
    };
    let preset = PresetRepo::create(&pool, USER, &input).await.unwrap();
    assert_eq!(preset.name, "Portrait");
    assert_eq!(preset.usage_count, 0);

    let err = PresetRepo::create(&pool, USER, &input).await.unwrap_err();
    assert_matches!(err, sqlx::Error::Database(ref db) if db.constraint() == Some("uq_presets_user_model_name"));

    let used = PresetRepo::record_use(&pool, preset.id, USER).await.unwrap().unwrap();
    assert_eq!(used.usage_count, 1);

    let updated = PresetRepo::update(
        &pool,
        preset.id,
        USER,
        &UpdatePreset {
            parameters: Some(json!({ "steps": 40 })),
            ..Default::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(updated.parameters["steps"], 40);
    assert_eq!(updated.name, "Portrait");

    assert_eq!(PresetRepo::list(&pool, USER, Some("flux-krea")).await.unwrap().len(), 1);
    assert!(PresetRepo::list(&pool, USER, Some("wan22")).await.unwrap().is_empty());
    assert!(PresetRepo::find_for_user(&pool, preset.id, OTHER).await.unwrap().is_none());
    assert!(PresetRepo::delete(&pool, preset.id, USER).await.unwrap());
}

// ---------------------------------------------------------------------------
// Settings, LoRAs, credits
// ---------------------------------------------------------------------------

fn write<'a>(service: &'a str, key: &'a str, value: Option<&'a str>) -> SettingWrite<'a> {
    SettingWrite { service, key, value, is_encrypted: service == "runpod" }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_settings_upsert_and_delete(pool: PgPool) {
    UserSettingRepo::apply(&pool, USER, &[write("s3", "bucket", Some("one"))]).await.unwrap();
    UserSettingRepo::apply(
        &pool,
        USER,
        &[write("s3", "bucket", Some("two")), write("runpod", "api_key", Some("sealed"))],
    )
    .await
    .unwrap();

    let all = UserSettingRepo::list(&pool, USER).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].service, "runpod");
    assert!(all[0].is_encrypted);
    assert_eq!(all[1].config_value, "two");

    UserSettingRepo::apply(&pool, USER, &[write("runpod", "api_key", None)]).await.unwrap();
    assert!(UserSettingRepo::list_for_service(&pool, USER, "runpod").await.unwrap().is_empty());
    assert_eq!(UserSettingRepo::delete_service(&pool, USER, "s3").await.unwrap(), 1);
    assert!(UserSettingRepo::list(&pool, USER).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_settings_batch_is_all_or_nothing(pool: PgPool) {
    UserSettingRepo::apply(&pool, USER, &[write("s3", "bucket", Some("keep"))]).await.unwrap();

    // Postgres rejects NUL bytes in text, failing the last write.
    let result = UserSettingRepo::apply(
        &pool,
        USER,
        &[
            write("s3", "bucket", None),
            write("s3", "region", Some("us-east-1")),
            write("s3", "endpoint_url", Some("http://bad\0host")),
        ],
    )
    .await;
    assert!(result.is_err());

    let rows = UserSettingRepo::list(&pool, USER).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].config_key, "bucket");
    assert_eq!(rows[0].config_value, "keep");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_lora_upsert_and_sync(pool: PgPool) {
    let lora = |file: &str, size: i64| NewLora {
        name: file.trim_end_matches(".safetensors").to_string(),
        file_name: file.to_string(),
        storage_key: format!("loras/user-a/{file}"),
        file_size: size,
        model_family: None,
        trigger_words: None,
    };
    let first = LoraRepo::upsert(&pool, USER, &lora("style.safetensors", 10)).await.unwrap();
    let again = LoraRepo::upsert(&pool, USER, &lora("style.safetensors", 20)).await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(again.file_size, 20);
    LoraRepo::upsert(&pool, USER, &lora("gone.safetensors", 5)).await.unwrap();

    let removed = LoraRepo::delete_missing(&pool, USER, &["loras/user-a/style.safetensors".to_string()])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    let remaining = LoraRepo::list(&pool, USER).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].file_name, "style.safetensors");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_credit_charges_and_totals(pool: PgPool) {
    let job = new_job(&pool, USER, "flux-krea").await;
    CreditRepo::record(&pool, USER, "top_up", 10.0, None, Some("welcome")).await.unwrap();

    let charge = CreditRepo::record_job_charge(&pool, USER, job.id, 0.25, "flux-krea")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(charge.amount, -0.25);
    assert!(CreditRepo::record_job_charge(&pool, USER, job.id, 0.25, "flux-krea")
        .await
        .unwrap()
        .is_none());

    let totals = CreditRepo::totals(&pool, USER).await.unwrap();
    assert!((totals.balance - 9.75).abs() < 1e-9);
    assert!((totals.total_spent - 0.25).abs() < 1e-9);
    assert!((totals.total_added - 10.0).abs() < 1e-9);
    assert_eq!(totals.activity_count, 2);

    let empty = CreditRepo::totals(&pool, OTHER).await.unwrap();
    assert_eq!(empty.balance, 0.0);
    assert_eq!(empty.activity_count, 0);

    let listed = CreditRepo::list(&pool, USER, None, None).await.unwrap();
    assert_eq!(listed[0].activity_type, "job_charge");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_video_project_storage(pool: PgPool) {
    let mut doc: VideoProjectDoc = serde_json::from_value(json!({
        "title": "Teaser",
        "tracks": [
            { "id": "t1", "kind": "video", "keyframes": [] },
            { "id": "t2", "kind": "music", "keyframes": [] }
        ]
    }))
    .unwrap();
    let project = VideoProjectRepo::create(&pool, USER, &doc).await.unwrap();
    assert_eq!(project.aspect_ratio, "16:9");
    assert_eq!(project.document["title"], "Teaser");

    let listed = VideoProjectRepo::list(&pool, USER, &VideoProjectListQuery::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].track_count, 2);

    doc.title = "Teaser v2".into();
    doc.aspect_ratio = "9:16".into();
    let updated = VideoProjectRepo::update(&pool, project.id, USER, &doc)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Teaser v2");
    assert_eq!(updated.aspect_ratio, "9:16");

    assert!(VideoProjectRepo::find_for_user(&pool, project.id, OTHER).await.unwrap().is_none());
    assert!(VideoProjectRepo::delete(&pool, project.id, USER).await.unwrap());
}
