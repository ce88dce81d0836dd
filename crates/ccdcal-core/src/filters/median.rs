use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Median filter with a square `size`×`size` window (size odd).
///
/// Edges are handled by clamping coordinates to the image. NaN pixels sort
/// last and are therefore only picked when most of the window is NaN.
pub fn median_filter(data: &Array2<f64>, size: usize) -> Array2<f64> {
    let (h, w) = data.dim();
    if h == 0 || w == 0 || size <= 1 {
        return data.clone();
    }
    let radius = size / 2;

    let filter_row = |row: usize| -> Vec<f64> {
        let mut window = Vec::with_capacity(size * size);
        (0..w)
            .map(|col| {
                window.clear();
                for dr in 0..size {
                    let r = (row + dr).saturating_sub(radius).min(h - 1);
                    for dc in 0..size {
                        let c = (col + dc).saturating_sub(radius).min(w - 1);
                        window.push(data[[r, c]]);
                    }
                }
                median_of(&mut window)
            })
            .collect()
    };

    let rows: Vec<Vec<f64>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(filter_row).collect()
    } else {
        (0..h).map(filter_row).collect()
    };

    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((h, w), flat).unwrap_or_else(|_| data.clone())
}

/// Median of a non-empty slice; reorders the slice. Even counts average the
/// two middle values.
pub fn median_of(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    let mid = n / 2;
    let upper = *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1;
    if n % 2 == 1 {
        upper
    } else {
        let lower = values[..mid]
            .iter()
            .copied()
            .max_by(|a, b| a.total_cmp(b))
            .unwrap_or(upper);
        (lower + upper) / 2.0
    }
}
