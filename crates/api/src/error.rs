use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use engui_cloud::runpod::RunPodError;
use engui_cloud::store::StorageError;
use engui_core::crypto::CryptoError;
use engui_core::error::CoreError;
use engui_core::ffmpeg::MediaToolError;
use engui_core::video_project::ProjectFormatError;
use serde_json::json;

/// Error returned by every handler, rendered as `{"error", "code"}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A resource addressed by something other than a database id
    /// (storage key, file path) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// RunPod or S3 rejected or failed the request.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// A provider call or media command did not finish in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Logged in full; clients only see a generic message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Build an upstream error, reclassifying it as a timeout when the
    /// provider message says so.
    pub fn upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        if looks_like_timeout(&message) {
            AppError::Timeout(message)
        } else {
            AppError::Upstream(message)
        }
    }
}

/// Fallback for provider errors that only report a timeout in their text.
fn looks_like_timeout(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("timeout") || lower.contains("timed out")
}

impl From<RunPodError> for AppError {
    fn from(err: RunPodError) -> Self {
        match err {
            RunPodError::Timeout => AppError::Timeout(err.to_string()),
            RunPodError::MissingCredentials => {
                AppError::Core(CoreError::NotConfigured(err.to_string()))
            }
            RunPodError::Request(ref e) if e.is_timeout() => AppError::Timeout(err.to_string()),
            RunPodError::Request(_) | RunPodError::Api { .. } | RunPodError::TooLarge { .. } => {
                AppError::upstream(err.to_string())
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotConfigured(msg) => AppError::Core(CoreError::NotConfigured(msg)),
            StorageError::NotFound(key) => AppError::NotFound(format!("Object '{key}' not found")),
            StorageError::InvalidKey(key) => AppError::BadRequest(format!("Invalid key '{key}'")),
            StorageError::S3(msg) => AppError::upstream(msg),
            StorageError::Timeout => AppError::Timeout("Storage request timed out".into()),
            StorageError::Io(e) => AppError::InternalError(e.to_string()),
        }
    }
}

impl From<MediaToolError> for AppError {
    fn from(err: MediaToolError) -> Self {
        match err {
            MediaToolError::TimedOut { .. } => AppError::Timeout(err.to_string()),
            MediaToolError::SourceNotFound(ref path) => {
                AppError::NotFound(format!("Media file '{}' not found", path.display()))
            }
            MediaToolError::InvalidTimestamp(_) => AppError::BadRequest(err.to_string()),
            MediaToolError::Failed { .. } | MediaToolError::BadProbe(_) => {
                AppError::BadRequest(format!("Media processing failed: {err}"))
            }
            MediaToolError::Missing { .. } | MediaToolError::Io(_) => {
                AppError::InternalError(err.to_string())
            }
        }
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        AppError::InternalError(format!("Settings decryption: {err}"))
    }
}

impl From<ProjectFormatError> for AppError {
    fn from(err: ProjectFormatError) -> Self {
        AppError::Core(CoreError::Validation(err.to_string()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::NotConfigured(msg) => {
                    (StatusCode::BAD_REQUEST, "NOT_CONFIGURED", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    sanitized()
                }
            },

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream provider error");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
            }
            AppError::Timeout(msg) => {
                tracing::warn!(error = %msg, "Request timed out");
                (StatusCode::REQUEST_TIMEOUT, "TIMEOUT", msg.clone())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                sanitized()
            }
        };

        (status, axum::Json(json!({ "error": message, "code": code }))).into_response()
    }
}

type ErrorParts = (StatusCode, &'static str, String);

/// 500 with the message hidden from the client.
fn sanitized() -> ErrorParts {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Missing rows are 404, `uq_*` violations 409, foreign key violations
/// 400. Anything else is logged and sanitized.
fn classify_sqlx_error(err: &sqlx::Error) -> ErrorParts {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => {
                    let constraint = db_err.constraint().unwrap_or("unknown");
                    if constraint.starts_with("uq_") {
                        return (
                            StatusCode::CONFLICT,
                            "CONFLICT",
                            format!("Duplicate value violates unique constraint: {constraint}"),
                        );
                    }
                }
                // foreign_key_violation
                Some("23503") => {
                    let constraint = db_err.constraint().unwrap_or("unknown");
                    return (
                        StatusCode::BAD_REQUEST,
                        "BAD_REQUEST",
                        format!("Referenced record does not exist: {constraint}"),
                    );
                }
                _ => {}
            }
            tracing::error!(error = %db_err, "Database error");
            sanitized()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            sanitized()
        }
    }
}
