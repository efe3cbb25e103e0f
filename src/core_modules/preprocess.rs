// THEORY:
// Preprocessing turns one source raster into the two images the scan compares. The
// green channel is the fixed `reference`; the red channel is the moving `comparison`.
// The reference loses `BORDER_COLUMNS` on each side so it is exactly
// `2 * BORDER_COLUMNS` narrower than the comparison. That reserved border is what lets
// the overlap window slide across the full shift range without leaving the comparison.

use crate::core_modules::channel::{Channel, extract};
use crate::core_modules::image_grid::{IntensityImage, RgbImage};
use crate::error::{AlignError, Result};

/// Columns removed from each side of the reference channel.
pub const BORDER_COLUMNS: usize = 20;

/// The reference/comparison pair produced from one source image.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPair {
    /// Cropped green channel.
    pub reference: IntensityImage,
    /// Full-width red channel.
    pub comparison: IntensityImage,
}

pub fn prepare(image: &RgbImage) -> Result<PreparedPair> {
    if image.width() <= 2 * BORDER_COLUMNS {
        return Err(AlignError::shape(format!(
            "image is {} columns wide; at least {} are needed to crop the reference",
            image.width(),
            2 * BORDER_COLUMNS + 1
        )));
    }
    let reference = extract(image, Channel::Green).crop_columns(BORDER_COLUMNS, BORDER_COLUMNS)?;
    let comparison = extract(image, Channel::Red);
    Ok(PreparedPair {
        reference,
        comparison,
    })
}
