//! Error types for the registration pipeline.
//!
//! Every failure is fatal for the run that triggered it. Errors raised while
//! scoring a single shift are wrapped in [`AlignError::AtShift`] so the
//! diagnostic names the offending shift.

use thiserror::Error;

/// Main error type for registration operations.
#[derive(Error, Debug)]
pub enum AlignError {
    /// Image dimensionality or channel count does not match what the operation needs.
    #[error("Shape error: {0}")]
    Shape(String),

    /// A shift or column index falls outside the scan geometry.
    #[error("Bounds error: {0}")]
    Bounds(String),

    /// A zero-mass bin was used as a divisor or log argument, or a sample was not finite.
    #[error("Domain error: {0}")]
    Domain(String),

    /// Bin size outside 1..=256.
    #[error("Invalid bin size {0}: expected a value in 1..=256")]
    BinSize(usize),

    /// A failure while scoring one shift of the scan.
    #[error("Shift {shift} failed: {source}")]
    AtShift {
        shift: usize,
        #[source]
        source: Box<AlignError>,
    },

    /// Decoding or encoding a raster file failed.
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker of the parallel scan went away before reporting.
    #[error("Worker error: {0}")]
    Worker(String),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, AlignError>;

impl AlignError {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    pub fn bounds(msg: impl Into<String>) -> Self {
        Self::Bounds(msg.into())
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Attach the shift index that was being scored when `self` occurred.
    pub fn at_shift(self, shift: usize) -> Self {
        Self::AtShift {
            shift,
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_category() {
        let err = AlignError::domain("zero mass at bin (3, 4)");
        assert_eq!(err.to_string(), "Domain error: zero mass at bin (3, 4)");
        assert_eq!(
            AlignError::BinSize(0).to_string(),
            "Invalid bin size 0: expected a value in 1..=256"
        );
    }

    #[test]
    fn at_shift_keeps_the_cause() {
        let err = AlignError::bounds("column 80 out of range").at_shift(12);
        let text = err.to_string();
        assert!(text.contains("Shift 12"));
        assert!(text.contains("column 80"));
        match err {
            AlignError::AtShift { shift, source } => {
                assert_eq!(shift, 12);
                assert!(matches!(*source, AlignError::Bounds(_)));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
