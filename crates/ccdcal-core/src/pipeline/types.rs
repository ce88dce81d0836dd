use std::path::PathBuf;

use crate::cosmic::CosmicRayReview;
use crate::frame::{DefectMask, Frame};
use crate::mask::HotPixelClassification;

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Collecting,
    CombiningDarks,
    ClassifyingHotPixels,
    CombiningMasks,
    DetectingCosmicRays,
    GroupingEvents,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collecting => write!(f, "Collecting frames"),
            Self::CombiningDarks => write!(f, "Combining darks"),
            Self::ClassifyingHotPixels => write!(f, "Classifying hot pixels"),
            Self::CombiningMasks => write!(f, "Combining masks"),
            Self::DetectingCosmicRays => write!(f, "Detecting cosmic rays"),
            Self::GroupingEvents => write!(f, "Grouping events"),
        }
    }
}

/// A combined dark written to disk.
#[derive(Clone, Debug)]
pub struct CombinedDark {
    pub exposure_time: f64,
    pub source_count: usize,
    pub path: PathBuf,
    pub frame: Frame,
}

/// Everything the pipeline produced.
#[derive(Clone, Debug, Default)]
pub struct PipelineOutput {
    pub combined_darks: Vec<CombinedDark>,
    pub hot_pixels: Option<HotPixelClassification>,
    /// OR of the hot-pixel mask and any extra masks.
    pub defect_mask: Option<DefectMask>,
    pub cosmic_rays: Option<CosmicRayReview>,
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g., exposure groups), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_pipeline` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
