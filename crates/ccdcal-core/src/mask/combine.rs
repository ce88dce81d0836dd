use ndarray::Zip;

use crate::error::{ensure_same_shape, CcdError, Result};
use crate::frame::{DefectMask, Frame};

/// Elementwise OR of all masks.
///
/// Order-independent. Fails with `MissingInput` for an empty slice and
/// `ShapeMismatch` if any mask differs in shape from the first.
pub fn combine(masks: &[&DefectMask]) -> Result<DefectMask> {
    let (first, rest) = masks
        .split_first()
        .ok_or_else(|| CcdError::MissingInput("no masks to combine".into()))?;

    for mask in rest {
        ensure_same_shape(first.shape(), mask.shape())?;
    }

    let mut result = first.as_array().clone();
    for mask in rest {
        Zip::from(&mut result)
            .and(mask.as_array())
            .for_each(|r, &m| *r |= m);
    }
    Ok(DefectMask::new(result))
}

/// Pixels set in `a` but not in `b` (`a AND NOT b`).
///
/// Used to recover newly found defects that were not already known.
pub fn subtract(a: &DefectMask, b: &DefectMask) -> Result<DefectMask> {
    ensure_same_shape(a.shape(), b.shape())?;
    let result = Zip::from(a.as_array())
        .and(b.as_array())
        .map_collect(|&x, &y| x && !y);
    Ok(DefectMask::new(result))
}

/// A copy of `frame` whose mask is its existing mask OR `mask`.
pub fn apply_mask(frame: &Frame, mask: &DefectMask) -> Result<Frame> {
    ensure_same_shape(frame.shape(), mask.shape())?;
    let merged = match frame.mask {
        Some(ref existing) => combine(&[existing, mask])?,
        None => mask.clone(),
    };
    let mut derived = frame.clone();
    derived.mask = Some(merged);
    Ok(derived)
}
