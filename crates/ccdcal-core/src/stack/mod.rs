pub mod sigma_clip;

pub use sigma_clip::{
    combine_files, combine_frames, ClipCenter, ClipDeviation, CombineConfig, CombineMethod,
};
