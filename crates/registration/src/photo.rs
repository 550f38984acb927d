//! Profile photo upload: type/size checks and data-URI encoding.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;

use crate::error::PhotoError;

/// Largest accepted upload (2 MiB).
pub const MAX_PHOTO_BYTES: usize = 2 * 1024 * 1024;

/// MIME types accepted for the profile photo.
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

/// A file picked by the user, not yet accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read `path` and guess its MIME type from the extension.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PhotoError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PhotoError::Unreadable(format!("{}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_from_extension(path);
        debug!(%name, %mime, size = bytes.len(), "photo loaded");
        Ok(Self { name, mime, bytes })
    }

    /// Check type and size, then encode as `data:<mime>;base64,<...>`.
    pub fn to_data_uri(&self) -> Result<String, PhotoError> {
        let mime = self.mime.trim().to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(PhotoError::UnsupportedType { mime });
        }
        if self.bytes.len() > MAX_PHOTO_BYTES {
            return Err(PhotoError::TooLarge {
                bytes: self.bytes.len(),
            });
        }
        Ok(format!("data:{mime};base64,{}", STANDARD.encode(&self.bytes)))
    }
}

fn mime_from_extension(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}
