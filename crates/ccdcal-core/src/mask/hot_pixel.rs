use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibrate::dark_current_map;
use crate::error::{ensure_same_shape, CcdError, Result};
use crate::frame::{DefectMask, Frame};

/// Thresholds for the cross-exposure hot-pixel test, in electrons/second.
///
/// Both are domain-tuned (typically read off a scatter plot of short vs long
/// dark current) and have no default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotPixelConfig {
    /// Long-exposure dark current above which a pixel is a candidate.
    pub long_threshold: f64,
    /// Short-exposure dark current above which a candidate is marked bad.
    pub short_threshold: f64,
}

impl HotPixelConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("long_threshold", self.long_threshold),
            ("short_threshold", self.short_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CcdError::InvalidParameter(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of the cross-exposure comparison.
#[derive(Clone, Debug)]
pub struct HotPixelClassification {
    /// Pixels with measurably elevated long-exposure dark current.
    pub candidates: DefectMask,
    /// Candidates whose short-exposure rate is also high: non-linear, hence
    /// not dark-subtractable.
    pub hot: DefectMask,
}

/// Flag pixels whose dark current is inconsistent between a short and a
/// long dark exposure.
///
/// Each frame is converted with its own gain and exposure time, so frames
/// with different gains compare in common units. Pixels masked in either
/// frame are never candidates and never hot.
pub fn classify_hot_pixels(
    short: &Frame,
    long: &Frame,
    config: &HotPixelConfig,
) -> Result<HotPixelClassification> {
    config.validate()?;
    ensure_same_shape(long.shape(), short.shape())?;
    let mut short_map = dark_current_map(short)?;
    let mut long_map = dark_current_map(long)?;
    exclude_masked(&mut short_map, short.mask.as_ref())?;
    exclude_masked(&mut long_map, long.mask.as_ref())?;

    // Both exposures are present once the maps exist.
    let short_exposure = short.metadata.exposure_time.unwrap_or(f64::NAN);
    let long_exposure = long.metadata.exposure_time.unwrap_or(f64::NAN);
    if short_exposure.partial_cmp(&long_exposure) != Some(std::cmp::Ordering::Less) {
        return Err(CcdError::InvalidParameter(format!(
            "short exposure ({short_exposure} s) must be shorter than long exposure ({long_exposure} s)"
        )));
    }

    let result = classify_dark_current_maps(&short_map, &long_map, config)?;

    info!(
        short_exposure,
        long_exposure,
        candidates = result.candidates.count(),
        hot = result.hot.count(),
        "Hot pixel classification complete"
    );
    Ok(result)
}

/// Blank out masked pixels so the classifier treats them as unusable.
fn exclude_masked(map: &mut Array2<f64>, mask: Option<&DefectMask>) -> Result<()> {
    if let Some(mask) = mask {
        ensure_same_shape(map.dim(), mask.shape())?;
        Zip::from(map).and(mask.as_array()).for_each(|v, &masked| {
            if masked {
                *v = f64::NAN;
            }
        });
    }
    Ok(())
}

/// Classification on precomputed dark-current maps (e⁻/s).
///
/// Non-finite pixels in either map are never candidates and never hot.
pub fn classify_dark_current_maps(
    short_map: &Array2<f64>,
    long_map: &Array2<f64>,
    config: &HotPixelConfig,
) -> Result<HotPixelClassification> {
    config.validate()?;
    ensure_same_shape(long_map.dim(), short_map.dim())?;

    let candidates = Zip::from(short_map)
        .and(long_map)
        .map_collect(|&s, &l| s.is_finite() && l.is_finite() && l > config.long_threshold);

    let hot = Zip::from(&candidates)
        .and(short_map)
        .map_collect(|&c, &s| c && s > config.short_threshold);

    Ok(HotPixelClassification {
        candidates: DefectMask::new(candidates),
        hot: DefectMask::new(hot),
    })
}
