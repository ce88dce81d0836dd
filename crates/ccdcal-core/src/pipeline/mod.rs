pub mod config;
mod orchestrator;
mod types;

pub use orchestrator::{
    build_defect_mask, combine_darks, derive_hot_pixel_mask, find_cosmic_rays, run_pipeline,
    run_pipeline_reported,
};
pub use types::{CombinedDark, PipelineOutput, PipelineStage, ProgressReporter};
