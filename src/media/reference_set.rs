use crate::error::Result;
use crate::media::encoder::{encode_batch, ImageBlob, PayloadLimit};
use crate::models::EncodedImage;

pub const MAX_REFERENCE_IMAGES: usize = 10;

/// Reference images accumulated while composing one prompt.
#[derive(Debug, Clone)]
pub struct ReferenceImageSet {
    images: Vec<String>,
    max_images: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub added: usize,
    pub warning: Option<PayloadLimit>,
}

impl Default for ReferenceImageSet {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            max_images: MAX_REFERENCE_IMAGES,
        }
    }
}

impl ReferenceImageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }

    /// Admits a batch of uploads. If the batch would push the set past its
    /// cap, none of it is admitted. The cap counts the whole batch,
    /// including files that would later be dropped for size.
    pub async fn admit(&mut self, blobs: Vec<ImageBlob>) -> Result<Admission> {
        if blobs.is_empty() {
            return Ok(Admission {
                added: 0,
                warning: None,
            });
        }

        if self.images.len() + blobs.len() > self.max_images {
            log::warn!(
                "Rejecting {} image(s): {} already attached, limit {}",
                blobs.len(),
                self.images.len(),
                self.max_images
            );
            return Err(PayloadLimit::TooManyImages {
                max: self.max_images,
            }
            .into());
        }

        let batch = encode_batch(blobs).await?;
        let added = batch.images.len();
        self.images.extend(batch.images);

        log::debug!("Attached {} reference image(s), {} total", added, self.images.len());

        Ok(Admission {
            added,
            warning: batch.warning,
        })
    }

    pub fn remove(&mut self, index: usize) -> Option<String> {
        if index < self.images.len() {
            Some(self.images.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.images.len() >= self.max_images
    }

    pub fn data_urls(&self) -> &[String] {
        &self.images
    }

    pub fn encoded(&self) -> Vec<EncodedImage> {
        self.images
            .iter()
            .filter_map(|url| EncodedImage::from_data_url(url))
            .collect()
    }
}
