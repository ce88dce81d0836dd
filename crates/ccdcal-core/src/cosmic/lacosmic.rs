use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consts::{
    DEFAULT_LACOSMIC_ITERATIONS, DEFAULT_LACOSMIC_OBJ_LIM, DEFAULT_LACOSMIC_SIGMA_CLIP,
    DEFAULT_LACOSMIC_SIGMA_FRAC, LACOSMIC_CLEAN_RADIUS, LACOSMIC_FINE_STRUCTURE_FLOOR,
    LACOSMIC_NOISE_FLOOR,
};
use crate::error::{CcdError, Result};
use crate::filters::median::{median_filter, median_of};
use crate::filters::morphology::grow_into;
use crate::frame::{DefectMask, Frame};

/// Parameters for Laplacian cosmic-ray detection (van Dokkum 2001).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaCosmicParams {
    /// Detector gain in electrons/ADU.
    pub gain: f64,
    /// Read noise in electrons.
    pub read_noise: f64,
    /// Detection limit in units of the noise model.
    #[serde(default = "default_sigma_clip")]
    pub sigma_clip: f64,
    /// Fraction of `sigma_clip` used when growing into neighbouring pixels.
    #[serde(default = "default_sigma_frac")]
    pub sigma_frac: f64,
    /// Minimum contrast between the Laplacian and the fine-structure image.
    #[serde(default = "default_obj_lim")]
    pub obj_lim: f64,
    /// Maximum detection passes.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Log per-pass counts at info level instead of debug.
    #[serde(default)]
    pub verbose: bool,
}

fn default_sigma_clip() -> f64 {
    DEFAULT_LACOSMIC_SIGMA_CLIP
}
fn default_sigma_frac() -> f64 {
    DEFAULT_LACOSMIC_SIGMA_FRAC
}
fn default_obj_lim() -> f64 {
    DEFAULT_LACOSMIC_OBJ_LIM
}
fn default_iterations() -> usize {
    DEFAULT_LACOSMIC_ITERATIONS
}

impl Default for LaCosmicParams {
    fn default() -> Self {
        Self {
            gain: 1.0,
            read_noise: 6.5,
            sigma_clip: DEFAULT_LACOSMIC_SIGMA_CLIP,
            sigma_frac: DEFAULT_LACOSMIC_SIGMA_FRAC,
            obj_lim: DEFAULT_LACOSMIC_OBJ_LIM,
            iterations: DEFAULT_LACOSMIC_ITERATIONS,
            verbose: false,
        }
    }
}

impl LaCosmicParams {
    pub fn validate(&self) -> Result<()> {
        if !self.gain.is_finite() || self.gain <= 0.0 {
            return Err(CcdError::InvalidParameter(format!(
                "gain must be positive, got {}",
                self.gain
            )));
        }
        if !self.read_noise.is_finite() || self.read_noise < 0.0 {
            return Err(CcdError::InvalidParameter(format!(
                "read noise must be non-negative, got {}",
                self.read_noise
            )));
        }
        if !self.sigma_clip.is_finite() || self.sigma_clip <= 0.0 {
            return Err(CcdError::InvalidParameter(format!(
                "sigma_clip must be positive, got {}",
                self.sigma_clip
            )));
        }
        if !(self.sigma_frac > 0.0 && self.sigma_frac <= 1.0) {
            return Err(CcdError::InvalidParameter(format!(
                "sigma_frac must lie in (0, 1], got {}",
                self.sigma_frac
            )));
        }
        if !self.obj_lim.is_finite() || self.obj_lim < 0.0 {
            return Err(CcdError::InvalidParameter(format!(
                "obj_lim must be non-negative, got {}",
                self.obj_lim
            )));
        }
        if self.iterations == 0 {
            return Err(CcdError::InvalidParameter(
                "at least one detection pass is required".into(),
            ));
        }
        Ok(())
    }
}

/// Detect and clean cosmic rays in a frame.
///
/// Pixels already set in the frame's mask are neither flagged nor used to
/// interpolate replacements. The returned frame carries
/// `input mask OR cosmic-ray mask` and has flagged pixels replaced by the
/// median of clean neighbours.
pub fn detect_cosmic_rays(frame: &Frame, params: &LaCosmicParams) -> Result<Frame> {
    params.validate()?;
    let shape = frame.shape();
    let in_mask = frame
        .mask
        .as_ref()
        .map(|m| m.as_array().clone())
        .unwrap_or_else(|| Array2::from_elem(shape, false));

    // Work in electrons so the Poisson term is just the pixel value.
    let mut clean = frame.data.mapv(|v| v * params.gain);
    let mut cr_mask = Array2::from_elem(shape, false);
    let read_var = params.read_noise * params.read_noise;
    let grow_limit = params.sigma_frac * params.sigma_clip;

    for pass in 1..=params.iterations {
        let lap = laplacian_plus(&clean);

        let noise = median_filter(&clean, 5)
            .mapv(|m| (m.max(0.0) + read_var).sqrt().max(LACOSMIC_NOISE_FLOOR));
        let significance = Zip::from(&lap)
            .and(&noise)
            .map_collect(|&l, &n| l / (2.0 * n));
        let sig_background = median_filter(&significance, 5);
        let sig = &significance - &sig_background;

        let med3 = median_filter(&clean, 3);
        let med7 = median_filter(&med3, 7);
        let fine = Zip::from(&med3)
            .and(&med7)
            .and(&noise)
            .map_collect(|&m3, &m7, &n| ((m3 - m7) / n).max(LACOSMIC_FINE_STRUCTURE_FLOOR));

        let seeds = Zip::from(&sig)
            .and(&fine)
            .and(&in_mask)
            .map_collect(|&s, &f, &masked| {
                !masked && s > params.sigma_clip && s / f > params.obj_lim
            });

        let above_clip = sig.mapv(|s| s > params.sigma_clip);
        let above_frac = sig.mapv(|s| s > grow_limit);
        let grown = exclude(&grow_into(&seeds, &above_clip), &in_mask);
        let grown = exclude(&grow_into(&grown, &above_frac), &in_mask);

        let mut new_pixels = 0usize;
        Zip::from(&mut cr_mask).and(&grown).for_each(|cr, &g| {
            if g && !*cr {
                *cr = true;
                new_pixels += 1;
            }
        });

        let total = cr_mask.iter().filter(|&&v| v).count();
        if params.verbose {
            info!(pass, new_pixels, total, "L.A.Cosmic pass");
        } else {
            debug!(pass, new_pixels, total, "L.A.Cosmic pass");
        }

        if new_pixels == 0 {
            break;
        }
        clean = replace_flagged(&clean, &cr_mask, &in_mask);
    }

    let combined = Zip::from(&in_mask)
        .and(&cr_mask)
        .map_collect(|&m, &c| m || c);

    let mut result = frame.clone();
    Zip::from(&mut result.data)
        .and(&clean)
        .and(&cr_mask)
        .for_each(|out, &c, &flagged| {
            if flagged {
                *out = c / params.gain;
            }
        });
    result.mask = Some(DefectMask::new(combined));
    Ok(result)
}

/// Positive part of the Laplacian, evaluated on a 2x block-replicated copy
/// and averaged back to the original grid.
fn laplacian_plus(data: &Array2<f64>) -> Array2<f64> {
    let (h, w) = data.dim();
    if h == 0 || w == 0 {
        return data.clone();
    }
    let sub_h = 2 * h as isize;
    let sub_w = 2 * w as isize;
    let sub = |i: isize, j: isize| -> f64 {
        let i = i.clamp(0, sub_h - 1) as usize;
        let j = j.clamp(0, sub_w - 1) as usize;
        data[[i / 2, j / 2]]
    };

    Array2::from_shape_fn((h, w), |(row, col)| {
        let mut sum = 0.0;
        for di in 0..2 {
            for dj in 0..2 {
                let i = (2 * row + di) as isize;
                let j = (2 * col + dj) as isize;
                let lap = 4.0 * sub(i, j)
                    - sub(i - 1, j)
                    - sub(i + 1, j)
                    - sub(i, j - 1)
                    - sub(i, j + 1);
                sum += lap.max(0.0);
            }
        }
        sum / 4.0
    })
}

fn exclude(mask: &Array2<bool>, excluded: &Array2<bool>) -> Array2<bool> {
    Zip::from(mask)
        .and(excluded)
        .map_collect(|&m, &e| m && !e)
}

/// Replace flagged pixels with the median of unflagged, unmasked pixels in
/// the surrounding window. Pixels with no usable neighbour keep their value.
fn replace_flagged(data: &Array2<f64>, flagged: &Array2<bool>, masked: &Array2<bool>) -> Array2<f64> {
    let (h, w) = data.dim();
    let r = LACOSMIC_CLEAN_RADIUS;
    let mut out = data.clone();
    let mut window = Vec::with_capacity((2 * r + 1) * (2 * r + 1));

    for ((row, col), &is_flagged) in flagged.indexed_iter() {
        if !is_flagged {
            continue;
        }
        window.clear();
        for nr in row.saturating_sub(r)..(row + r + 1).min(h) {
            for nc in col.saturating_sub(r)..(col + r + 1).min(w) {
                if !flagged[[nr, nc]] && !masked[[nr, nc]] && data[[nr, nc]].is_finite() {
                    window.push(data[[nr, nc]]);
                }
            }
        }
        if !window.is_empty() {
            out[[row, col]] = median_of(&mut window);
        }
    }
    out
}
