use sqlx::PgPool;

/// Full bootstrap test: connect, migrate, verify schema.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    engui_db::health_check(&pool).await.unwrap();

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM job_statuses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 6);
}

/// The `job_statuses` seed data must match the `JobStatus` enum.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_status_seed_matches_enum(pool: PgPool) {
    use engui_db::models::status::JobStatus;

    let rows: Vec<(i16, String)> = sqlx::query_as("SELECT id, name FROM job_statuses ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(rows.len(), JobStatus::ALL.len());
    for (id, name) in rows {
        let status = JobStatus::from_id(id).unwrap_or_else(|| panic!("unknown status id {id}"));
        assert_eq!(status.name(), name);
    }
}

/// Every table carries an `updated_at` trigger.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_updated_at_triggers_present(pool: PgPool) {
    let tables = [
        "workspaces",
        "jobs",
        "workspace_media",
        "presets",
        "loras",
        "user_settings",
        "credit_activities",
        "video_projects",
    ];
    for table in tables {
        let found: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM information_schema.triggers \
             WHERE event_object_table = $1 AND trigger_name = $2",
        )
        .bind(table)
        .bind(format!("trg_{table}_updated_at"))
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(found.0 > 0, "{table} is missing its updated_at trigger");
    }
}
