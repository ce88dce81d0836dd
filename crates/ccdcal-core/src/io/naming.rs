//! File names of persisted calibration artifacts.

/// Hot-pixel mask derived from cross-exposure dark current comparison.
pub const MASK_FROM_DARK_CURRENT: &str = "mask_from_dark_current.fits";

/// Cosmic-ray-only mask of a science frame.
pub const COSMIC_RAY_MASK: &str = "mask_from_cosmic_rays.fits";

/// `combined_dark_<exptime>.fit`, with the exposure in its shortest decimal
/// form that still shows it is a float (`90.0`, `0.5`).
pub fn combined_dark_file_name(exposure_time: f64) -> String {
    let mut text = format!("{exposure_time}");
    if !text.contains('.') {
        text.push_str(".0");
    }
    format!("combined_dark_{text}.fit")
}
