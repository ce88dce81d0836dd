#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ndarray::Array2;

use ccdcal_core::frame::{Frame, ImageType};
use ccdcal_core::io::fits::save_frame;

/// Write a DARK frame filled with `fill` to `dir/name`.
pub fn write_dark(dir: &Path, name: &str, fill: f64, exposure: f64, gain: f64) -> PathBuf {
    let data = Array2::from_elem((8, 8), fill);
    write_dark_data(dir, name, data, exposure, gain)
}

pub fn write_dark_data(
    dir: &Path,
    name: &str,
    data: Array2<f64>,
    exposure: f64,
    gain: f64,
) -> PathBuf {
    let path = dir.join(name);
    save_frame(&Frame::dark(data, exposure, gain), &path).unwrap();
    path
}

/// A LIGHT frame of constant background with single-pixel spikes.
pub fn science_frame(shape: (usize, usize), background: f64, spikes: &[(usize, usize)]) -> Frame {
    let mut data = Array2::from_elem(shape, background);
    for &(r, c) in spikes {
        data[[r, c]] = background + 5000.0;
    }
    let mut frame = Frame::new(data);
    frame.metadata.image_type = Some(ImageType::Light);
    frame.metadata.exposure_time = Some(300.0);
    frame
}

/// Build a minimal single-HDU FITS file with unsigned 16-bit pixels
/// (BITPIX 16, BZERO 32768), the way camera software writes raw frames.
pub fn build_u16_fits(rows: usize, cols: usize, pixels: &[u16], cards: &[(&str, &str)]) -> Vec<u8> {
    let mut header = String::new();
    let mut card = |text: String| header.push_str(&format!("{text:<80}"));
    card(format!("{:<8}= {:>20}", "SIMPLE", "T"));
    card(format!("{:<8}= {:>20}", "BITPIX", 16));
    card(format!("{:<8}= {:>20}", "NAXIS", 2));
    card(format!("{:<8}= {:>20}", "NAXIS1", cols));
    card(format!("{:<8}= {:>20}", "NAXIS2", rows));
    card(format!("{:<8}= {:>20}", "BZERO", 32768));
    card(format!("{:<8}= {:>20}", "BSCALE", 1));
    for (key, value) in cards {
        card(format!("{key:<8}= {value:>20}"));
    }
    card("END".to_string());

    let mut buf = header.into_bytes();
    buf.resize(buf.len().div_ceil(2880) * 2880, b' ');
    for &p in pixels {
        let stored = (p as i32 - 32768) as i16;
        buf.extend_from_slice(&stored.to_be_bytes());
    }
    buf.resize(buf.len().div_ceil(2880) * 2880, 0);
    buf
}
