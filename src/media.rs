use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::models::NoteAttachment;

/// Largest media payload we will inline into the store blob.
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to read media file: {0}")]
    Io(#[from] std::io::Error),
    #[error("media file is {0} bytes, over the {MAX_ATTACHMENT_BYTES} byte limit")]
    TooLarge(u64),
}

/// Read a media file into an encoded attachment payload.
///
/// Single-shot: it either completes with the payload or fails, and the
/// note submission it belongs to is abandoned on failure. Never touches
/// the record store.
pub fn load_attachment(path: &Path) -> Result<NoteAttachment, MediaError> {
    let size = fs::metadata(path)?.len();
    if size > MAX_ATTACHMENT_BYTES {
        return Err(MediaError::TooLarge(size));
    }

    let bytes = fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());

    Ok(NoteAttachment {
        mime_type: mime_type_for(&file_name).to_string(),
        file_name,
        data: STANDARD.encode(&bytes),
    })
}

fn mime_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_map_to_mime_types() {
        assert_eq!(mime_type_for("yard.JPG"), "image/jpeg");
        assert_eq!(mime_type_for("before.png"), "image/png");
        assert_eq!(mime_type_for("estimate.pdf"), "application/pdf");
        assert_eq!(mime_type_for("readme"), "application/octet-stream");
    }

    #[test]
    fn missing_file_surfaces_an_io_error() {
        let result = load_attachment(Path::new("/no/such/photo.png"));
        assert!(matches!(result, Err(MediaError::Io(_))));
    }
}
