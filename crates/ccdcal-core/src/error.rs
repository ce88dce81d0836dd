use thiserror::Error;

#[derive(Error, Debug)]
pub enum CcdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Shape mismatch: expected {}x{}, found {}x{}", expected.0, expected.1, found.0, found.1)]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CcdError>;

/// Fail with `ShapeMismatch` unless both shapes agree.
pub(crate) fn ensure_same_shape(expected: (usize, usize), found: (usize, usize)) -> Result<()> {
    if expected != found {
        return Err(CcdError::ShapeMismatch { expected, found });
    }
    Ok(())
}
