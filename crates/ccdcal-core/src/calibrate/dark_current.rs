use ndarray::{Array2, Zip};
use num_traits::ToPrimitive;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{CcdError, Result};
use crate::frame::{Frame, ImageType};

/// Convert raw counts to a dark-current rate in electrons/second.
///
/// Computes `gain * counts / exposure_time` elementwise in f64, so the full
/// 16-bit sensor range is represented exactly. Counts that cannot be
/// represented as f64 become NaN.
pub fn dark_current<T>(counts: &Array2<T>, gain: f64, exposure_time: f64) -> Result<Array2<f64>>
where
    T: ToPrimitive + Copy + Send + Sync,
{
    validate_positive("gain", gain)?;
    validate_positive("exposure time", exposure_time)?;

    let rate = |c: &T| gain * c.to_f64().unwrap_or(f64::NAN) / exposure_time;

    if counts.len() >= PARALLEL_PIXEL_THRESHOLD {
        Ok(Zip::from(counts).par_map_collect(rate))
    } else {
        Ok(counts.map(rate))
    }
}

/// Dark-current map of a frame tagged DARK, using its own gain and exposure.
pub fn dark_current_map(frame: &Frame) -> Result<Array2<f64>> {
    if !frame.is_type(ImageType::Dark) {
        return Err(CcdError::InvalidParameter(format!(
            "dark current is only defined for DARK frames, got {}",
            frame
                .metadata
                .image_type
                .map(|t| t.to_string())
                .unwrap_or_else(|| "untyped frame".into())
        )));
    }
    let gain = frame
        .metadata
        .gain
        .ok_or_else(|| CcdError::MissingInput("dark frame has no GAIN".into()))?;
    let exposure = frame
        .metadata
        .exposure_time
        .ok_or_else(|| CcdError::MissingInput("dark frame has no EXPTIME".into()))?;
    dark_current(&frame.data, gain, exposure)
}

fn validate_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CcdError::InvalidParameter(format!(
            "{name} must be positive and finite, got {value}"
        )));
    }
    Ok(())
}
