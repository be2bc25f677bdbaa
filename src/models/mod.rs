pub mod gemini;
pub mod image;
pub mod relay;

pub use gemini::*;
pub use image::*;
pub use relay::*;
