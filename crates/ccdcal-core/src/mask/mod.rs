pub mod combine;
pub mod hot_pixel;

pub use combine::{apply_mask, combine, subtract};
pub use hot_pixel::{classify_hot_pixels, HotPixelClassification, HotPixelConfig};
