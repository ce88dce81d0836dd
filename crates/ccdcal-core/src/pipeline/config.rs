use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cosmic::{LaCosmicParams, LabelConfig};
use crate::error::Result;
use crate::mask::HotPixelConfig;
use crate::stack::CombineConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub darks: DarkConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hot_pixels: Option<HotPixelStageConfig>,
    #[serde(default)]
    pub masks: MaskConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmic_rays: Option<CosmicRayConfig>,
}

impl PipelineConfig {
    /// Check every stage's parameters before any file is touched.
    pub fn validate(&self) -> Result<()> {
        self.darks.combine.validate()?;
        if let Some(ref hot) = self.hot_pixels {
            hot.thresholds.validate()?;
        }
        if let Some(ref cr) = self.cosmic_rays {
            cr.lacosmic.validate()?;
            cr.label.validate()?;
        }
        Ok(())
    }
}

/// Where raw darks are found and combined darks are written.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DarkConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub combine: CombineConfig,
}

/// Which combined darks to compare and how.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HotPixelStageConfig {
    /// Short exposure in seconds; the shortest available when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_exposure: Option<f64>,
    /// Long exposure in seconds; the longest available when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_exposure: Option<f64>,
    #[serde(flatten)]
    pub thresholds: HotPixelConfig,
}

/// Additional defect masks OR-ed into the hot-pixel mask.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MaskConfig {
    #[serde(default)]
    pub extra: Vec<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CosmicRayConfig {
    /// Science frame to clean.
    pub science: PathBuf,
    #[serde(default)]
    pub lacosmic: LaCosmicParams,
    #[serde(default)]
    pub label: LabelConfig,
}
