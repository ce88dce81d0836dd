use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{CcdError, Result};

/// A single calibration or science frame.
///
/// Pixel values are raw counts (ADU) stored as f64, shape = (rows, cols).
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (rows, cols)
    pub data: Array2<f64>,
    /// Header-derived metadata
    pub metadata: FrameMetadata,
    /// Optional defect mask, same shape as `data`. True = excluded.
    pub mask: Option<DefectMask>,
}

impl Frame {
    pub fn new(data: Array2<f64>) -> Self {
        Self {
            data,
            metadata: FrameMetadata::default(),
            mask: None,
        }
    }

    /// Build a frame tagged as a dark with the given exposure time and gain.
    pub fn dark(data: Array2<f64>, exposure_time: f64, gain: f64) -> Self {
        Self {
            data,
            metadata: FrameMetadata {
                image_type: Some(ImageType::Dark),
                exposure_time: Some(exposure_time),
                gain: Some(gain),
                ..Default::default()
            },
            mask: None,
        }
    }

    /// Attach a mask, checking that it matches the pixel grid.
    pub fn with_mask(mut self, mask: DefectMask) -> Result<Self> {
        crate::error::ensure_same_shape(self.shape(), mask.shape())?;
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_type(&self, image_type: ImageType) -> bool {
        self.metadata.image_type == Some(image_type)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    pub image_type: Option<ImageType>,
    /// Exposure duration in seconds.
    pub exposure_time: Option<f64>,
    /// Detector gain in electrons/ADU.
    pub gain: Option<f64>,
    /// Set on every frame produced by the combiner.
    pub combined: bool,
    /// Header cards not interpreted above, in file order.
    pub extra: Vec<(String, HeaderValue)>,
}

/// A typed FITS header value.
#[derive(Clone, Debug, PartialEq)]
pub enum HeaderValue {
    Logical(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl HeaderValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Logical(b) => Some(*b),
            _ => None,
        }
    }
}

/// Declared role of a frame, from the `IMAGETYP` keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageType {
    Bias,
    Dark,
    Flat,
    Light,
}

impl ImageType {
    /// Canonical header spelling.
    pub fn as_header_str(&self) -> &'static str {
        match self {
            ImageType::Bias => "BIAS",
            ImageType::Dark => "DARK",
            ImageType::Flat => "FLAT",
            ImageType::Light => "LIGHT",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_header_str())
    }
}

impl FromStr for ImageType {
    type Err = CcdError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        // Acquisition software writes e.g. "Dark Frame" or "Light Frame".
        let first = normalized.split_whitespace().next().unwrap_or("");
        match first {
            "bias" | "zero" => Ok(ImageType::Bias),
            "dark" => Ok(ImageType::Dark),
            "flat" => Ok(ImageType::Flat),
            "light" | "object" | "science" => Ok(ImageType::Light),
            _ => Err(CcdError::InvalidParameter(format!(
                "unknown image type '{}'",
                s.trim()
            ))),
        }
    }
}

/// Boolean per-pixel defect map. True marks a pixel excluded from statistics.
///
/// Masks are values: every operation on them returns a new mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefectMask(Array2<bool>);

impl DefectMask {
    pub fn new(data: Array2<bool>) -> Self {
        Self(data)
    }

    /// All-False mask of the given (rows, cols) shape.
    pub fn empty(shape: (usize, usize)) -> Self {
        Self(Array2::from_elem(shape, false))
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.0.dim()
    }

    /// Number of True pixels.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&v| v).count()
    }

    pub fn is_clear(&self) -> bool {
        !self.0.iter().any(|&v| v)
    }

    /// Coordinates (row, col) of True pixels in raster order.
    pub fn positions(&self) -> Vec<(usize, usize)> {
        self.0
            .indexed_iter()
            .filter(|&(_, &v)| v)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.0
    }

    pub fn into_array(self) -> Array2<bool> {
        self.0
    }
}

impl From<Array2<bool>> for DefectMask {
    fn from(data: Array2<bool>) -> Self {
        Self(data)
    }
}

impl std::ops::Index<[usize; 2]> for DefectMask {
    type Output = bool;

    fn index(&self, index: [usize; 2]) -> &bool {
        &self.0[index]
    }
}
