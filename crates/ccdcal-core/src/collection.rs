use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::consts::EXPOSURE_TIME_TOLERANCE;
use crate::error::{CcdError, Result};
use crate::frame::ImageType;
use crate::io::fits::read_header;

const FITS_EXTENSIONS: &[&str] = &["fit", "fits", "fts"];

/// Header summary of one file in a collection.
#[derive(Clone, Debug)]
pub struct FrameSummary {
    pub path: PathBuf,
    pub image_type: Option<ImageType>,
    /// Exposure duration in seconds.
    pub exposure_time: Option<f64>,
}

/// Paths of all frames of one type sharing an exposure time.
#[derive(Clone, Debug)]
pub struct ExposureGroup {
    pub exposure_time: f64,
    pub paths: Vec<PathBuf>,
}

/// A labeled set of frames that can be partitioned by type and exposure.
#[derive(Clone, Debug, Default)]
pub struct FrameCollection {
    entries: Vec<FrameSummary>,
}

impl FrameCollection {
    pub fn new(entries: Vec<FrameSummary>) -> Self {
        Self { entries }
    }

    /// Summarize every FITS file in `dir` (non-recursive, sorted by name).
    ///
    /// Files whose header cannot be read are skipped with a warning.
    pub fn from_directory(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(CcdError::MissingInput(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_fits_path(p))
            .collect();
        paths.sort();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            match read_header(&path) {
                Ok(header) => {
                    let metadata = header.frame_metadata();
                    entries.push(FrameSummary {
                        path,
                        image_type: metadata.image_type,
                        exposure_time: metadata.exposure_time,
                    });
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable file"),
            }
        }

        debug!(dir = %dir.display(), files = entries.len(), "Collected frames");
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[FrameSummary] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct exposure times among frames of `image_type`, ascending.
    pub fn exposure_times(&self, image_type: ImageType) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .entries
            .iter()
            .filter(|e| e.image_type == Some(image_type))
            .filter_map(|e| e.exposure_time)
            .filter(|t| t.is_finite())
            .collect();
        times.sort_by(f64::total_cmp);
        times.dedup_by(|a, b| same_exposure(*a, *b));
        times
    }

    /// Paths of frames with `image_type` and exposure `exposure_time`, in
    /// collection order. Empty when nothing matches.
    pub fn files_filtered(&self, image_type: ImageType, exposure_time: f64) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter(|e| e.image_type == Some(image_type))
            .filter(|e| {
                e.exposure_time
                    .is_some_and(|t| same_exposure(t, exposure_time))
            })
            .map(|e| e.path.clone())
            .collect()
    }

    /// Like `files_filtered`, but an empty selection is a `MissingInput` error.
    pub fn require_files(&self, image_type: ImageType, exposure_time: f64) -> Result<Vec<PathBuf>> {
        let paths = self.files_filtered(image_type, exposure_time);
        if paths.is_empty() {
            return Err(CcdError::MissingInput(format!(
                "no {image_type} frames with exposure time {exposure_time} s"
            )));
        }
        Ok(paths)
    }

    /// All frames of `image_type`, grouped by exposure time in ascending order.
    pub fn group_by_exposure(&self, image_type: ImageType) -> Vec<ExposureGroup> {
        self.exposure_times(image_type)
            .into_iter()
            .map(|exposure_time| ExposureGroup {
                exposure_time,
                paths: self.files_filtered(image_type, exposure_time),
            })
            .collect()
    }
}

/// Exposure times equal within `EXPOSURE_TIME_TOLERANCE`.
pub fn same_exposure(a: f64, b: f64) -> bool {
    (a - b).abs() <= EXPOSURE_TIME_TOLERANCE
}

fn is_fits_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| FITS_EXTENSIONS.iter().any(|f| ext.eq_ignore_ascii_case(f)))
}
