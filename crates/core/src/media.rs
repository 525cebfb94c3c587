//! Media type classification shared by jobs, workspace media and uploads.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Output or input media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

impl MediaType {
    /// Database / wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    /// Parse from the database `media_type` column.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(CoreError::Validation(format!(
                "Invalid media_type '{other}'. Must be one of: image, video, audio"
            ))),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel dimensions read from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Read image dimensions from an in-memory buffer without decoding pixels.
///
/// Returns `None` for formats the `image` crate cannot sniff (or for
/// non-image payloads); callers treat dimensions as optional metadata.
pub fn image_dimensions(bytes: &[u8]) -> Option<ImageDimensions> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(ImageDimensions { width, height })
}
