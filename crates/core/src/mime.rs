//! MIME type lookup tables.
//!
//! Maps between file extensions and MIME types for the media formats the
//! studio produces or accepts as generation inputs.

use crate::media::MediaType;

/// Fallback MIME type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// `(extension, mime, media type)` for every supported format.
///
/// The first entry for a given MIME type is its canonical extension.
const TABLE: &[(&str, &str, MediaType)] = &[
    ("png", "image/png", MediaType::Image),
    ("jpg", "image/jpeg", MediaType::Image),
    ("jpeg", "image/jpeg", MediaType::Image),
    ("webp", "image/webp", MediaType::Image),
    ("gif", "image/gif", MediaType::Image),
    ("bmp", "image/bmp", MediaType::Image),
    ("mp4", "video/mp4", MediaType::Video),
    ("m4v", "video/mp4", MediaType::Video),
    ("webm", "video/webm", MediaType::Video),
    ("mov", "video/quicktime", MediaType::Video),
    ("mkv", "video/x-matroska", MediaType::Video),
    ("avi", "video/x-msvideo", MediaType::Video),
    ("mp3", "audio/mpeg", MediaType::Audio),
    ("wav", "audio/wav", MediaType::Audio),
    ("ogg", "audio/ogg", MediaType::Audio),
    ("m4a", "audio/mp4", MediaType::Audio),
    ("aac", "audio/aac", MediaType::Audio),
    ("flac", "audio/flac", MediaType::Audio),
];

/// Extensions accepted for LoRA weight uploads.
pub const LORA_EXTENSIONS: &[&str] = &["safetensors", "ckpt", "pt"];

/// Lower-cased extension of a path or file name, without the dot.
pub fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// MIME type for an extension (case-insensitive).
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(e, _, _)| *e == ext)
        .map(|(_, mime, _)| *mime)
}

/// MIME type for a path, falling back to `application/octet-stream`.
pub fn mime_for_path(path: &str) -> &'static str {
    extension_of(path)
        .and_then(|ext| mime_for_extension(&ext))
        .unwrap_or(OCTET_STREAM)
}

/// Canonical extension for a MIME type. Parameters (`; charset=...`) are ignored.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    // Some providers report `audio/x-wav` or `image/jpg`.
    let essence = match essence.as_str() {
        "audio/x-wav" | "audio/wave" => "audio/wav".to_string(),
        "image/jpg" => "image/jpeg".to_string(),
        "audio/mp3" => "audio/mpeg".to_string(),
        _ => essence,
    };
    TABLE
        .iter()
        .find(|(_, m, _)| *m == essence)
        .map(|(ext, _, _)| *ext)
}

/// Classify a MIME type into a media type.
pub fn media_type_for_mime(mime: &str) -> Option<MediaType> {
    let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    if essence.starts_with("image/") {
        Some(MediaType::Image)
    } else if essence.starts_with("video/") {
        Some(MediaType::Video)
    } else if essence.starts_with("audio/") {
        Some(MediaType::Audio)
    } else {
        None
    }
}

/// Classify a file path by its extension.
pub fn media_type_for_path(path: &str) -> Option<MediaType> {
    let ext = extension_of(path)?;
    TABLE
        .iter()
        .find(|(e, _, _)| *e == ext)
        .map(|(_, _, kind)| *kind)
}

/// Whether `ext` is an accepted upload format for the given media type.
pub fn is_allowed_upload(kind: MediaType, ext: &str) -> bool {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    TABLE.iter().any(|(e, _, k)| *e == ext && *k == kind)
}

/// Whether `file_name` carries a LoRA weight extension.
pub fn is_lora_file(file_name: &str) -> bool {
    extension_of(file_name).is_some_and(|ext| LORA_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(mime_for_extension("PNG"), Some("image/png"));
        assert_eq!(mime_for_extension(".mp4"), Some("video/mp4"));
        assert_eq!(mime_for_extension("xyz"), None);
    }

    #[test]
    fn path_lookup_falls_back_to_octet_stream() {
        assert_eq!(mime_for_path("results/job_1.webm"), "video/webm");
        assert_eq!(mime_for_path("README"), OCTET_STREAM);
        assert_eq!(mime_for_path("archive.tar.zst"), OCTET_STREAM);
    }

    #[test]
    fn canonical_extension_for_mime() {
        assert_eq!(extension_for_mime("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for_mime("video/mp4"), Some("mp4"));
        assert_eq!(extension_for_mime("audio/x-wav"), Some("wav"));
        assert_eq!(extension_for_mime("image/png; charset=binary"), Some("png"));
        assert_eq!(extension_for_mime("text/plain"), None);
    }

    #[test]
    fn classify_by_mime_and_path() {
        assert_eq!(media_type_for_mime("audio/mpeg"), Some(MediaType::Audio));
        assert_eq!(media_type_for_mime("application/json"), None);
        assert_eq!(media_type_for_path("clip.MOV"), Some(MediaType::Video));
        assert_eq!(media_type_for_path(".hidden"), None);
    }

    #[test]
    fn upload_allow_list_respects_kind() {
        assert!(is_allowed_upload(MediaType::Image, "webp"));
        assert!(!is_allowed_upload(MediaType::Image, "mp4"));
        assert!(is_allowed_upload(MediaType::Audio, "WAV"));
    }

    #[test]
    fn lora_extensions() {
        assert!(is_lora_file("my_style.safetensors"));
        assert!(is_lora_file("old.CKPT"));
        assert!(!is_lora_file("notes.txt"));
        assert!(!is_lora_file("safetensors"));
    }
}
