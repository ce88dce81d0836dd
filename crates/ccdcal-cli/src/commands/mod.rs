pub mod combine_darks;
pub mod config;
pub mod cosmic_rays;
pub mod hot_pixels;
pub mod info;
pub mod masks;
pub mod pipeline;
