use std::fmt;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;

use crate::error::{GenerationError, Result};

/// Largest reference image accepted, measured before encoding.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// A user-supplied image file, not yet encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            GenerationError::Unknown(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::new(name, mime_from_path(path), bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_oversized(&self) -> bool {
        self.size() > MAX_IMAGE_BYTES
    }
}

pub fn mime_from_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

/// Why part or all of an upload was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLimit {
    TooManyImages { max: usize },
    ImagesTooLarge { skipped: usize },
}

impl fmt::Display for PayloadLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadLimit::TooManyImages { max } => {
                write!(f, "Maximum {} reference images allowed.", max)
            }
            PayloadLimit::ImagesTooLarge { .. } => write!(
                f,
                "Some files were skipped because they exceed {}MB.",
                MAX_IMAGE_BYTES / (1024 * 1024)
            ),
        }
    }
}

impl From<PayloadLimit> for GenerationError {
    fn from(limit: PayloadLimit) -> Self {
        GenerationError::PayloadTooLarge(limit.to_string())
    }
}

/// Result of encoding a batch: the data URLs that made it, in input order,
/// and a single warning if anything was dropped for size.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedBatch {
    pub images: Vec<String>,
    pub warning: Option<PayloadLimit>,
}

pub fn encode_blob(blob: &ImageBlob) -> String {
    format!("data:{};base64,{}", blob.mime_type, STANDARD.encode(&blob.bytes))
}

pub async fn encode_batch(blobs: Vec<ImageBlob>) -> Result<EncodedBatch> {
    let (valid, oversized): (Vec<_>, Vec<_>) = blobs.into_iter().partition(|b| !b.is_oversized());

    let warning = if oversized.is_empty() {
        None
    } else {
        log::warn!(
            "Skipping {} reference image(s) over {} bytes",
            oversized.len(),
            MAX_IMAGE_BYTES
        );
        Some(PayloadLimit::ImagesTooLarge {
            skipped: oversized.len(),
        })
    };

    let tasks = valid
        .into_iter()
        .map(|blob| tokio::task::spawn_blocking(move || encode_blob(&blob)));

    let mut images = Vec::new();
    for joined in join_all(tasks).await {
        let data_url = joined
            .map_err(|e| GenerationError::Unknown(format!("Image encoding failed: {}", e)))?;
        images.push(data_url);
    }

    Ok(EncodedBatch { images, warning })
}
