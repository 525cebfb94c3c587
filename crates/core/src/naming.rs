//! File naming and storage key conventions.
//!
//! Every object the studio writes (results, uploads, thumbnails, LoRA
//! weights) is addressed by a relative storage key. The same key is used
//! on local disk (under `STORAGE_DIR`) and in the S3 bucket, so migrating
//! between the two is a plain copy.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::types::DbId;

/// Top-level prefix for generated job results.
pub const RESULTS_PREFIX: &str = "results";

/// Top-level prefix for user-uploaded generation inputs.
pub const UPLOADS_PREFIX: &str = "uploads";

/// Top-level prefix for extracted frames and thumbnails.
pub const THUMBNAILS_PREFIX: &str = "thumbnails";

/// Top-level prefix for LoRA weights.
pub const LORAS_PREFIX: &str = "loras";

/// Maximum length of a sanitized file name (excluding extension).
const MAX_STEM_LEN: usize = 120;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

/// Reduce a user-supplied file name to `[A-Za-z0-9._-]`.
///
/// Directory components are dropped, runs of other characters collapse to
/// a single `_`, leading dots are stripped and the stem is truncated.
/// Returns `"file"` when nothing usable remains.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.').trim_matches('_');

    let (stem, ext) = match cleaned.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() && !e.is_empty() => (s, Some(e)),
        _ => (cleaned, None),
    };

    let stem: String = stem.trim_matches('_').chars().take(MAX_STEM_LEN).collect();
    let stem = if stem.is_empty() { "file".to_string() } else { stem };

    match ext {
        Some(ext) => format!("{stem}.{}", ext.to_ascii_lowercase()),
        None => stem,
    }
}

/// Make a user id safe for use as a single path segment.
pub fn user_segment(user_id: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(user_id, "_");
    let cleaned = cleaned.trim_matches(['.', '_']);
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Deterministic result file name: `job_{id}_{yyyymmdd_hhmmss}.{ext}`.
///
/// ```
/// use chrono::TimeZone;
/// use engui_core::naming::result_file_name;
///
/// let at = chrono::Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
/// assert_eq!(result_file_name(42, "mp4", at), "job_42_20250309_140507.mp4");
/// ```
pub fn result_file_name(job_id: DbId, ext: &str, at: DateTime<Utc>) -> String {
    format!(
        "job_{job_id}_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        ext.trim_start_matches('.').to_ascii_lowercase()
    )
}

/// Storage key for a job result.
pub fn result_key(user_id: &str, file_name: &str) -> String {
    format!("{RESULTS_PREFIX}/{}/{file_name}", user_segment(user_id))
}

/// Storage key for an uploaded input file. A random prefix avoids collisions
/// between uploads that share a name.
pub fn upload_key(user_id: &str, original_name: &str) -> String {
    let unique = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{UPLOADS_PREFIX}/{}/{}_{}",
        user_segment(user_id),
        &unique[..12],
        sanitize_file_name(original_name)
    )
}

/// Storage key for an extracted frame of `source_key`.
pub fn thumbnail_key(user_id: &str, source_name: &str, label: &str, ext: &str) -> String {
    let stem = sanitize_file_name(source_name);
    let stem = stem.rsplit_once('.').map(|(s, _)| s).unwrap_or(&stem);
    format!(
        "{THUMBNAILS_PREFIX}/{}/{stem}_{label}.{ext}",
        user_segment(user_id)
    )
}

/// Storage key for a LoRA weight file.
pub fn lora_key(user_id: &str, file_name: &str) -> String {
    format!(
        "{LORAS_PREFIX}/{}/{}",
        user_segment(user_id),
        sanitize_file_name(file_name)
    )
}

/// Reject keys that could escape the storage root.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && !key.contains('\0')
        && key.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}
