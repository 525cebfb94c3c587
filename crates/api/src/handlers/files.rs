//! Handlers for `/files`: local media store downloads with HTTP range
//! request support.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{self, HeaderMap};
use axum::http::StatusCode;
use axum::response::Response;
use engui_cloud::store::LocalStore;
use engui_core::mime;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Maximum bytes served for an open-ended range (`bytes=N-`), 1 MiB.
const MAX_CHUNK_SIZE: u64 = 1024 * 1024;

/// Parse a `Range: bytes=START-END` header value.
/// Returns `(start, optional_end)`.
fn parse_range_header(range: &str) -> Option<(u64, Option<u64>)> {
    let range = range.strip_prefix("bytes=")?;
    let (start, end) = range.split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = match end.trim() {
        "" => None,
        e => Some(e.parse::<u64>().ok()?),
    };
    Some((start, end))
}

/// GET /api/v1/files/{*path}
pub async fn serve_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    stream_local(&state.local_store, &path, &headers).await
}

/// Stream a file from the local store, honouring a `Range` header.
pub(crate) async fn stream_local(
    store: &LocalStore,
    key: &str,
    headers: &HeaderMap,
) -> AppResult<Response> {
    let path = store.path_for(key)?;

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(AppError::NotFound(format!("File '{key}' not found"))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("File '{key}' not found")))
        }
        Err(e) => return Err(AppError::InternalError(e.to_string())),
    };
    let file_size = metadata.len();
    let content_type = mime::mime_for_path(key);

    // Check for Range header.
    if let Some(range_value) = headers.get(header::RANGE) {
        let range_str = range_value
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Range header".into()))?;

        if let Some((start, end)) = parse_range_header(range_str) {
            let last = file_size.saturating_sub(1);
            let end = end
                .map(|e| e.min(last))
                .unwrap_or_else(|| (start.saturating_add(MAX_CHUNK_SIZE - 1)).min(last));

            if file_size == 0 || start >= file_size || start > end {
                return Response::builder()
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{file_size}"))
                    .body(Body::empty())
                    .map_err(|e| AppError::InternalError(e.to_string()));
            }

            let length = end - start + 1;

            let mut file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| AppError::InternalError(e.to_string()))?;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|e| AppError::InternalError(e.to_string()))?;

            let limited = file.take(length);
            let stream = ReaderStream::new(limited);

            return Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, length.to_string())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {start}-{end}/{file_size}"),
                )
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::from_stream(stream))
                .map_err(|e| AppError::InternalError(e.to_string()));
        }
    }

    // No usable Range header -- serve the full file.
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, file_size.to_string())
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_header_parsing() {
        assert_eq!(parse_range_header("bytes=0-99"), Some((0, Some(99))));
        assert_eq!(parse_range_header("bytes=100-"), Some((100, None)));
        assert_eq!(parse_range_header("bytes=-5"), None);
        assert_eq!(parse_range_header("items=0-1"), None);
        assert_eq!(parse_range_header("bytes=abc-1"), None);
    }
}
