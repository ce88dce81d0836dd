use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consts::DEFAULT_LABEL_THRESHOLD;
use crate::error::{CcdError, Result};
use crate::frame::{DefectMask, Frame};
use crate::mask::subtract;

use super::components::{detect_sources, Component, Connectivity};

/// A connected group of flagged pixels in a cosmic-ray mask, kept for review.
pub type CosmicRayEvent = Component;

/// How flagged pixels are grouped into events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default)]
    pub connectivity: Connectivity,
    /// Level applied to the mask seen as a 0/1 image. Must lie in (0, 1).
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Components with fewer pixels are discarded as noise.
    #[serde(default = "default_min_pixels")]
    pub min_pixels: usize,
}

fn default_threshold() -> f64 {
    DEFAULT_LABEL_THRESHOLD
}
fn default_min_pixels() -> usize {
    1
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::default(),
            threshold: DEFAULT_LABEL_THRESHOLD,
            min_pixels: 1,
        }
    }
}

impl LabelConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(CcdError::InvalidParameter(format!(
                "label threshold must lie in (0, 1), got {}",
                self.threshold
            )));
        }
        if self.min_pixels == 0 {
            return Err(CcdError::InvalidParameter(
                "minimum event size must be at least one pixel".into(),
            ));
        }
        Ok(())
    }
}

/// Cosmic-ray mask with its grouped events.
#[derive(Clone, Debug)]
pub struct CosmicRayReview {
    /// Flagged pixels not already present in the applied defect mask.
    pub mask: DefectMask,
    pub events: Vec<CosmicRayEvent>,
}

impl CosmicRayReview {
    /// Total pixels covered by surviving events.
    pub fn event_pixels(&self) -> usize {
        self.events.iter().map(|e| e.area).sum()
    }
}

/// Detector output minus the defect mask that was applied before detection.
pub fn cosmic_ray_only(raw: &DefectMask, applied: &DefectMask) -> Result<DefectMask> {
    subtract(raw, applied)
}

/// Group flagged pixels into events, dropping those below `min_pixels`.
pub fn group_events(mask: &DefectMask, config: &LabelConfig) -> Result<Vec<CosmicRayEvent>> {
    config.validate()?;
    let image = mask.as_array().mapv(|v| if v { 1.0 } else { 0.0 });
    Ok(detect_sources(
        &image,
        config.threshold,
        config.min_pixels,
        config.connectivity,
    ))
}

/// Raw detector mask + applied defect mask → cosmic-ray-only mask and events.
pub fn post_filter(
    raw: &DefectMask,
    applied: &DefectMask,
    config: &LabelConfig,
) -> Result<CosmicRayReview> {
    config.validate()?;
    let mask = cosmic_ray_only(raw, applied)?;
    let events = group_events(&mask, config)?;
    info!(
        flagged = mask.count(),
        events = events.len(),
        connectivity = %config.connectivity,
        min_pixels = config.min_pixels,
        "Cosmic ray events grouped"
    );
    Ok(CosmicRayReview { mask, events })
}

/// `post_filter` on a frame returned by the detector.
pub fn post_filter_frame(
    detected: &Frame,
    applied: &DefectMask,
    config: &LabelConfig,
) -> Result<CosmicRayReview> {
    let raw = detected
        .mask
        .as_ref()
        .ok_or_else(|| CcdError::MissingInput("detected frame carries no mask".into()))?;
    post_filter(raw, applied, config)
}
