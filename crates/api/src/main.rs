use std::net::SocketAddr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engui_api::background::job_poller;
use engui_api::config::ServerConfig;
use engui_api::router::build_app_router;
use engui_api::state::AppState;

/// Text logs by default; `LOG_FORMAT=json` for one JSON object per line.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "engui_api=debug,engui_cloud=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = engui_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    engui_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    engui_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Local media store ---
    tokio::fs::create_dir_all(&config.storage_dir)
        .await
        .expect("Failed to create storage directory");
    tracing::info!(storage_dir = %config.storage_dir.display(), "Local media store ready");

    // --- App state ---
    let state = AppState::new(pool, config.clone()).expect("Failed to build HTTP client");

    // --- Background RunPod poller ---
    let poller_cancel = CancellationToken::new();
    let poller_handle = tokio::spawn(job_poller::run(state.clone(), poller_cancel.clone()));

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // A poll pass already underway completes before the poller exits.
    poller_cancel.cancel();
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(shutdown_timeout, poller_handle).await.is_err() {
        tracing::warn!("Job poller did not stop within the shutdown timeout");
    } else {
        tracing::info!("Job poller stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("SIGINT received, draining requests");
        }
        () = terminate => {
            tracing::info!("SIGTERM received, draining requests");
        }
    }
}
