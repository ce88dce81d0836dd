/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Two exposure times closer than this (seconds) are treated as equal.
pub const EXPOSURE_TIME_TOLERANCE: f64 = 1e-6;

/// FITS logical record size in bytes.
pub const FITS_BLOCK_SIZE: usize = 2880;

/// FITS header card width in bytes.
pub const FITS_CARD_SIZE: usize = 80;

/// Extension name used for a frame's defect mask.
pub const MASK_EXTNAME: &str = "MASK";

/// Default per-batch memory budget for the sigma-clipped combiner (350 MB).
pub const DEFAULT_COMBINE_MEMORY_LIMIT: usize = 350_000_000;

/// Default lower/upper sigma-clip bounds for dark combination.
pub const DEFAULT_CLIP_SIGMA: f64 = 5.0;

/// Default rejection passes for sigma clipping.
pub const DEFAULT_CLIP_ITERATIONS: usize = 1;

/// Scale factor turning a median absolute deviation into a Gaussian sigma.
pub const MAD_TO_STD: f64 = 1.482_602_218_505_602;

/// Default L.A.Cosmic detection limit (sigma).
pub const DEFAULT_LACOSMIC_SIGMA_CLIP: f64 = 4.5;

/// Default L.A.Cosmic neighbour growth fraction of the detection limit.
pub const DEFAULT_LACOSMIC_SIGMA_FRAC: f64 = 0.3;

/// Default L.A.Cosmic minimum contrast between Laplacian and fine structure.
pub const DEFAULT_LACOSMIC_OBJ_LIM: f64 = 5.0;

/// Default number of L.A.Cosmic detection passes.
pub const DEFAULT_LACOSMIC_ITERATIONS: usize = 4;

/// Floor applied to the L.A.Cosmic fine-structure image.
pub const LACOSMIC_FINE_STRUCTURE_FLOOR: f64 = 0.01;

/// Floor applied to the L.A.Cosmic noise model (ADU).
pub const LACOSMIC_NOISE_FLOOR: f64 = 1e-5;

/// Half-width of the replacement window used when cleaning flagged pixels.
pub const LACOSMIC_CLEAN_RADIUS: usize = 2;

/// Default labeling threshold applied to a 0/1 mask image.
pub const DEFAULT_LABEL_THRESHOLD: f64 = 0.5;
