use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{GenerationError, Result};
use crate::models::EncodedImage;

/// Splits a result data URL into its mime type and raw bytes.
pub fn decode_data_url(data_url: &str) -> Result<(String, Vec<u8>)> {
    let image = EncodedImage::from_data_url(data_url)
        .ok_or_else(|| GenerationError::Unknown("Generated image is not a data URL".into()))?;
    let bytes = STANDARD
        .decode(image.data.as_bytes())
        .map_err(|e| GenerationError::Unknown(format!("Failed to decode image data: {}", e)))?;
    Ok((image.mime_type, bytes))
}

pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

pub fn download_file_name(mime_type: &str) -> String {
    format!(
        "nano-banana-pro-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        extension_for(mime_type)
    )
}

/// Writes a generated image into `dir` and returns the file path.
pub async fn save_image(data_url: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let (mime_type, bytes) = decode_data_url(data_url)?;
    let path = dir.as_ref().join(download_file_name(&mime_type));

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| GenerationError::Unknown(format!("Failed to save {}: {}", path.display(), e)))?;

    log::info!("💾 Image saved to: {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_payload() {
        let (mime, bytes) = decode_data_url("data:image/webp;base64,QQ==").unwrap();
        assert_eq!(mime, "image/webp");
        assert_eq!(bytes, b"A");
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_data_url("not a data url").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn names_follow_mime() {
        let name = download_file_name("image/jpeg");
        assert!(name.starts_with("nano-banana-pro-"));
        assert!(name.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn saves_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_image("data:image/png;base64,QQ==", dir.path()).await.unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        assert_eq!(std::fs::read(&path).unwrap(), b"A");
    }
}
