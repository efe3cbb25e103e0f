// THEORY:
// The overlap window is the geometric heart of the scan. For a shift hypothesis `s`,
// output column `j` is read from comparison column `(MAX_SHIFT - s) + j`. Shift 0 reads
// the rightmost window of the comparison and shift `MAX_SHIFT` reads the leftmost, so
// the shift index fixes which physical displacement is being tested. The mapping is
// kept exactly; callers interpret the scan in those terms.

use crate::core_modules::image_grid::IntensityImage;
use crate::error::{AlignError, Result};

/// Largest shift index the scan visits.
pub const MAX_SHIFT: usize = 40;
/// Number of shift candidates, `0..=MAX_SHIFT`.
pub const SHIFT_COUNT: usize = MAX_SHIFT + 1;

pub type Shift = usize;

/// Cuts the region of `comparison` that aligns with `reference` under `shift`.
///
/// The result has the dimensions of `reference`.
pub fn window(
    reference: &IntensityImage,
    comparison: &IntensityImage,
    shift: Shift,
) -> Result<IntensityImage> {
    if shift > MAX_SHIFT {
        return Err(AlignError::bounds(format!(
            "shift {shift} is outside 0..={MAX_SHIFT}"
        )));
    }
    let needed = reference.width() + MAX_SHIFT;
    if comparison.width() < needed {
        return Err(AlignError::bounds(format!(
            "comparison is {} columns wide, the window needs {needed}",
            comparison.width()
        )));
    }
    if comparison.height() < reference.height() {
        return Err(AlignError::bounds(format!(
            "comparison has {} rows, the reference has {}",
            comparison.height(),
            reference.height()
        )));
    }

    let offset = MAX_SHIFT - shift;
    Ok(IntensityImage::from_fn(
        reference.height(),
        reference.width(),
        |row, col| comparison.get(row, offset + col),
    ))
}
