pub mod download;
pub mod encoder;
pub mod reference_set;

pub use download::{decode_data_url, save_image};
pub use encoder::{encode_batch, encode_blob, EncodedBatch, ImageBlob, PayloadLimit, MAX_IMAGE_BYTES};
pub use reference_set::{Admission, ReferenceImageSet, MAX_REFERENCE_IMAGES};
