use std::path::PathBuf;

use engui_cloud::runpod::DEFAULT_API_BASE;

/// Passphrase used when `ENCRYPTION_KEY` is unset. Only suitable for local
/// development; a warning is logged at startup.
pub const DEV_ENCRYPTION_KEY: &str = "enguistudio-dev-only-encryption-key";

/// User id assumed when a request carries no `x-user-id` header.
pub const DEFAULT_USER_ID: &str = "user-with-settings";

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`).
    pub request_timeout_secs: u64,
    /// How long background tasks get to stop after shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Root directory of the local media store (default: `storage`).
    pub storage_dir: PathBuf,
    /// Passphrase for encrypting provider secrets at rest.
    pub encryption_key: String,
    /// RunPod serverless API base URL.
    pub runpod_api_base: String,
    /// Server-wide RunPod API key; a user's own key takes precedence.
    pub runpod_api_key: Option<String>,
    /// Interval of the background job poller in seconds (default: `5`).
    pub job_poll_interval_secs: u64,
    /// Maximum multipart upload size in bytes (default: 500 MiB).
    pub max_upload_bytes: usize,
    /// User id for requests without an `x-user-id` header.
    pub default_user_id: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                     |
    /// |--------------------------|-----------------------------|
    /// | `HOST`                   | `0.0.0.0`                   |
    /// | `PORT`                   | `3000`                      |
    /// | `CORS_ORIGINS`           | `http://localhost:3000`     |
    /// | `REQUEST_TIMEOUT_SECS`   | `60`                        |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`                        |
    /// | `STORAGE_DIR`            | `storage`                   |
    /// | `ENCRYPTION_KEY`         | dev fallback                |
    /// | `RUNPOD_API_BASE`        | `https://api.runpod.ai/v2`  |
    /// | `RUNPOD_API_KEY`         | none                        |
    /// | `JOB_POLL_INTERVAL_SECS` | `5`                         |
    /// | `MAX_UPLOAD_BYTES`       | `524288000`                 |
    /// | `DEFAULT_USER_ID`        | `user-with-settings`        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let storage_dir = PathBuf::from(
            std::env::var("STORAGE_DIR").unwrap_or_else(|_| "storage".into()),
        );

        let encryption_key = match std::env::var("ENCRYPTION_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                tracing::warn!(
                    "ENCRYPTION_KEY is not set; using the development key for provider secrets"
                );
                DEV_ENCRYPTION_KEY.to_string()
            }
        };

        let runpod_api_base =
            std::env::var("RUNPOD_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.into());

        let runpod_api_key = std::env::var("RUNPOD_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let job_poll_interval_secs: u64 = std::env::var("JOB_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("JOB_POLL_INTERVAL_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "524288000".into())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let default_user_id =
            std::env::var("DEFAULT_USER_ID").unwrap_or_else(|_| DEFAULT_USER_ID.into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            storage_dir,
            encryption_key,
            runpod_api_base,
            runpod_api_key,
            job_poll_interval_secs: job_poll_interval_secs.max(1),
            max_upload_bytes,
            default_user_id,
        }
    }
}
