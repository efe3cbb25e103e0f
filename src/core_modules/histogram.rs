// THEORY:
// The histogram estimator turns images into probability mass functions. It works in two
// stages, mirroring the `Chunk` -> `SmartChunk` split: a "dumb" 256-entry integer
// histogram of raw intensities, then a normalised marginal PMF that merges `bin_size`
// adjacent intensities into one bucket.
//
// Binning layouts:
// - `Full` (default): `ceil(256 / bin_size)` buckets; the last bucket covers the
//   remainder `256 mod bin_size`. Every pixel lands in a bucket, so the PMF sums to 1.
// - `Legacy`: bucket starts `0, b, 2b, ...` strictly below 255, each bucket clamped at
//   intensity 255. This reproduces historical numeric traces, including the fact that
//   intensity 255 is only counted when the last bucket happens to reach it.
//
// Joint PMFs come in two flavours. `joint_pmf` combines two marginals additively,
// `x[i] + y[j]`, then renormalises the grid. It is not a co-occurrence histogram and
// depends on the images only through their marginals. `co_occurrence_pmf` is the
// textbook alternative: it counts the (bin, bin) pair at every pixel position.

use crate::core_modules::image_grid::IntensityImage;
use crate::error::{AlignError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Number of raw intensity levels an 8-bit channel can take.
pub const INTENSITY_LEVELS: usize = 256;

pub type Probability = f64;

/// Number of adjacent raw intensities merged into one bucket, in `1..=256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct BinSize(usize);

impl BinSize {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 || size > INTENSITY_LEVELS {
            return Err(AlignError::BinSize(size));
        }
        Ok(Self(size))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for BinSize {
    fn default() -> Self {
        Self(1)
    }
}

impl TryFrom<usize> for BinSize {
    type Error = AlignError;

    fn try_from(size: usize) -> Result<Self> {
        Self::new(size)
    }
}

impl From<BinSize> for usize {
    fn from(size: BinSize) -> usize {
        size.0
    }
}

/// How raw intensities are grouped into buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinLayout {
    #[default]
    Full,
    Legacy,
}

impl BinLayout {
    /// Exclusive upper bound on bucket start positions.
    fn start_limit(self) -> usize {
        match self {
            BinLayout::Full => INTENSITY_LEVELS,
            BinLayout::Legacy => INTENSITY_LEVELS - 1,
        }
    }

    pub fn bin_count(self, bin_size: BinSize) -> usize {
        self.start_limit().div_ceil(bin_size.get())
    }

    /// Raw intensity range covered by each bucket, in bucket order.
    pub fn bin_ranges(self, bin_size: BinSize) -> Vec<Range<usize>> {
        let size = bin_size.get();
        (0..self.start_limit())
            .step_by(size)
            .map(|start| start..(start + size).min(INTENSITY_LEVELS))
            .collect()
    }

    /// Bucket holding raw intensity `level`, or `None` when the layout drops it.
    #[inline]
    pub fn bin_of(self, level: usize, bin_size: BinSize) -> Option<usize> {
        let bin = level / bin_size.get();
        (level < INTENSITY_LEVELS && bin < self.bin_count(bin_size)).then_some(bin)
    }
}

/// Maps a real-valued sample onto a raw intensity level.
///
/// Samples are truncated toward zero and clamped into `0..=255`. Non-finite samples
/// have no level and are reported as a domain error by the callers.
#[inline]
pub fn intensity_level(sample: f64) -> Option<usize> {
    sample
        .is_finite()
        .then(|| sample.trunc().clamp(0.0, (INTENSITY_LEVELS - 1) as f64) as usize)
}

fn level_at(image: &IntensityImage, row: usize, col: usize) -> Result<usize> {
    let sample = image.get(row, col);
    intensity_level(sample).ok_or_else(|| {
        AlignError::domain(format!(
            "sample {sample} at (row {row}, col {col}) is not a finite intensity"
        ))
    })
}

/// Raw 256-entry count of intensity levels in one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityHistogram {
    counts: [u64; INTENSITY_LEVELS],
    total: u64,
}

impl IntensityHistogram {
    pub fn from_image(image: &IntensityImage) -> Result<Self> {
        let mut counts = [0u64; INTENSITY_LEVELS];
        for row in 0..image.height() {
            for col in 0..image.width() {
                counts[level_at(image, row, col)?] += 1;
            }
        }
        Ok(Self {
            counts,
            total: image.len() as u64,
        })
    }

    pub fn counts(&self) -> &[u64; INTENSITY_LEVELS] {
        &self.counts
    }

    /// Number of pixels counted. Independent of any later binning.
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// A normalised one-dimensional intensity histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginalPmf {
    probabilities: Vec<Probability>,
    bin_size: BinSize,
    layout: BinLayout,
    pixel_count: u64,
}

impl MarginalPmf {
    pub fn from_histogram(
        histogram: &IntensityHistogram,
        bin_size: BinSize,
        layout: BinLayout,
    ) -> Result<Self> {
        if histogram.total() == 0 {
            return Err(AlignError::domain(
                "cannot normalise the histogram of an empty image",
            ));
        }
        let total = histogram.total() as f64;
        let probabilities = layout
            .bin_ranges(bin_size)
            .into_iter()
            .map(|range| histogram.counts()[range].iter().sum::<u64>() as f64 / total)
            .collect();
        Ok(Self {
            probabilities,
            bin_size,
            layout,
            pixel_count: histogram.total(),
        })
    }

    pub fn probabilities(&self) -> &[Probability] {
        &self.probabilities
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    /// Probability of bucket `bin`, or `None` when the bucket holds no mass.
    #[inline]
    pub fn mass(&self, bin: usize) -> Option<Probability> {
        self.probabilities.get(bin).copied().filter(|&p| p > 0.0)
    }

    pub fn sum(&self) -> Probability {
        self.probabilities.iter().sum()
    }

    pub fn bin_size(&self) -> BinSize {
        self.bin_size
    }

    pub fn layout(&self) -> BinLayout {
        self.layout
    }

    pub fn pixel_count(&self) -> u64 {
        self.pixel_count
    }
}

pub fn marginal_pmf(
    image: &IntensityImage,
    bin_size: BinSize,
    layout: BinLayout,
) -> Result<MarginalPmf> {
    MarginalPmf::from_histogram(&IntensityHistogram::from_image(image)?, bin_size, layout)
}

/// A normalised two-dimensional histogram, indexed `(x bin, y bin)`.
#[derive(Debug, Clone, PartialEq)]
pub struct JointPmf {
    rows: usize,
    cols: usize,
    cells: Vec<Probability>,
}

impl JointPmf {
    fn normalised(rows: usize, cols: usize, mut cells: Vec<Probability>) -> Result<Self> {
        let total: Probability = cells.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(AlignError::domain(format!(
                "joint histogram total {total} cannot be normalised"
            )));
        }
        cells.iter_mut().for_each(|cell| *cell /= total);
        Ok(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, x_bin: usize, y_bin: usize) -> Probability {
        self.cells[x_bin * self.cols + y_bin]
    }

    pub fn cells(&self) -> &[Probability] {
        &self.cells
    }

    pub fn sum(&self) -> Probability {
        self.cells.iter().sum()
    }
}

/// Additive joint PMF: every cell is `x[i] + y[j]`, renormalised to sum to 1.
pub fn joint_pmf(x_pmf: &MarginalPmf, y_pmf: &MarginalPmf) -> Result<JointPmf> {
    let (rows, cols) = (x_pmf.len(), y_pmf.len());
    let mut cells = Vec::with_capacity(rows * cols);
    for &x in x_pmf.probabilities() {
        for &y in y_pmf.probabilities() {
            cells.push(x + y);
        }
    }
    JointPmf::normalised(rows, cols, cells)
}

/// Co-occurrence joint PMF: counts the bucket pair found at each pixel position.
///
/// Pixels whose intensity the layout drops are not counted. The cells are divided by
/// the pixel count, so the row and column sums equal the two marginal PMFs.
pub fn co_occurrence_pmf(
    a: &IntensityImage,
    b: &IntensityImage,
    bin_size: BinSize,
    layout: BinLayout,
) -> Result<JointPmf> {
    if a.height() != b.height() || a.width() != b.width() {
        return Err(AlignError::shape(format!(
            "co-occurrence needs equal shapes, got {}x{} and {}x{}",
            a.height(),
            a.width(),
            b.height(),
            b.width()
        )));
    }
    if a.is_empty() {
        return Err(AlignError::domain(
            "cannot build a co-occurrence histogram of empty images",
        ));
    }
    let bins = layout.bin_count(bin_size);
    let mut counts = vec![0u64; bins * bins];
    for row in 0..a.height() {
        for col in 0..a.width() {
            let x = layout.bin_of(level_at(a, row, col)?, bin_size);
            let y = layout.bin_of(level_at(b, row, col)?, bin_size);
            if let (Some(x), Some(y)) = (x, y) {
                counts[x * bins + y] += 1;
            }
        }
    }
    let pixels = a.len() as f64;
    Ok(JointPmf {
        rows: bins,
        cols: bins,
        cells: counts.into_iter().map(|c| c as f64 / pixels).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(height: usize, width: usize) -> IntensityImage {
        IntensityImage::from_fn(height, width, |row, col| ((row * width + col) % 256) as f64)
    }

    fn bins(size: usize) -> BinSize {
        BinSize::new(size).unwrap()
    }

    #[test]
    fn bin_size_is_validated() {
        assert!(BinSize::new(0).is_err());
        assert!(BinSize::new(257).is_err());
        assert_eq!(BinSize::new(256).unwrap().get(), 256);
        assert_eq!(BinSize::default().get(), 1);
    }

    #[test]
    fn full_layout_sums_to_one_for_every_bin_size() {
        let image = gradient(16, 37);
        for size in 1..=INTENSITY_LEVELS {
            let pmf = marginal_pmf(&image, bins(size), BinLayout::Full).unwrap();
            assert_eq!(pmf.len(), INTENSITY_LEVELS.div_ceil(size), "bin size {size}");
            assert!((pmf.sum() - 1.0).abs() < 1e-9, "bin size {size}: {}", pmf.sum());
            assert_eq!(pmf.pixel_count(), 16 * 37);
        }
    }

    #[test]
    fn remainder_bucket_covers_the_tail() {
        let ranges = BinLayout::Full.bin_ranges(bins(3));
        assert_eq!(ranges.len(), 86);
        assert_eq!(ranges.last().unwrap().clone(), 255..256);

        let ranges = BinLayout::Full.bin_ranges(bins(255));
        assert_eq!(ranges, vec![0..255, 255..256]);
        assert_eq!(BinLayout::Full.bin_ranges(bins(256)), vec![0..256]);
    }

    #[test]
    fn boundary_bin_sizes_count_every_pixel() {
        let image = IntensityImage::from_fn(2, 2, |row, col| if row + col == 0 { 255.0 } else { 3.0 });
        let wide = marginal_pmf(&image, bins(255), BinLayout::Full).unwrap();
        assert_eq!(wide.probabilities(), &[0.75, 0.25]);
        let whole = marginal_pmf(&image, bins(256), BinLayout::Full).unwrap();
        assert_eq!(whole.probabilities(), &[1.0]);
    }

    #[test]
    fn legacy_layout_reproduces_reference_bucket_counts() {
        assert_eq!(BinLayout::Legacy.bin_count(bins(1)), 255);
        assert_eq!(BinLayout::Legacy.bin_count(bins(2)), 128);
        assert_eq!(BinLayout::Legacy.bin_count(bins(3)), 85);
        assert_eq!(BinLayout::Legacy.bin_count(bins(255)), 1);
        assert_eq!(BinLayout::Legacy.bin_count(bins(256)), 1);

        // Intensity 255 falls outside the last bucket for a bin size of 3.
        let image = IntensityImage::from_fn(1, 4, |_, col| if col == 0 { 255.0 } else { 0.0 });
        let pmf = marginal_pmf(&image, bins(3), BinLayout::Legacy).unwrap();
        assert!((pmf.sum() - 0.75).abs() < 1e-12);
        assert_eq!(BinLayout::Legacy.bin_of(255, bins(3)), None);
        assert_eq!(BinLayout::Legacy.bin_of(255, bins(2)), Some(127));

        // A bin size that does not divide 255 is clamped instead of reading past the table.
        let pmf = marginal_pmf(&gradient(1, 256), bins(7), BinLayout::Legacy).unwrap();
        assert_eq!(pmf.len(), 37);
        assert!((pmf.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pixel_count_does_not_depend_on_bin_size() {
        let image = gradient(9, 11);
        let fine = marginal_pmf(&image, bins(1), BinLayout::Full).unwrap();
        let coarse = marginal_pmf(&image, bins(64), BinLayout::Full).unwrap();
        assert_eq!(fine.pixel_count(), coarse.pixel_count());
        assert!(coarse.len() < fine.len());
    }

    #[test]
    fn samples_are_truncated_and_clamped() {
        assert_eq!(intensity_level(12.9), Some(12));
        assert_eq!(intensity_level(-0.7), Some(0));
        assert_eq!(intensity_level(-3.0), Some(0));
        assert_eq!(intensity_level(300.0), Some(255));
        assert_eq!(intensity_level(f64::NAN), None);

        let image = IntensityImage::from_vec(1, 2, vec![1.0, f64::INFINITY]).unwrap();
        assert!(matches!(
            IntensityHistogram::from_image(&image),
            Err(AlignError::Domain(_))
        ));
    }

    #[test]
    fn empty_bucket_has_no_mass() {
        let image = IntensityImage::from_fn(1, 3, |_, _| 10.0);
        let pmf = marginal_pmf(&image, bins(8), BinLayout::Full).unwrap();
        assert_eq!(pmf.mass(1), Some(1.0));
        assert_eq!(pmf.mass(0), None);
        assert_eq!(pmf.mass(1000), None);
    }

    #[test]
    fn additive_joint_is_normalised() {
        let x = marginal_pmf(&gradient(4, 64), bins(16), BinLayout::Full).unwrap();
        let y = marginal_pmf(&IntensityImage::from_fn(3, 3, |_, _| 40.0), bins(16), BinLayout::Full)
            .unwrap();
        let joint = joint_pmf(&x, &y).unwrap();
        assert_eq!((joint.rows(), joint.cols()), (16, 16));
        assert!((joint.sum() - 1.0).abs() < 1e-9);
        // x and y each sum to 1, so the raw grid sums to 16 + 16.
        assert!((joint.get(0, 2) - (x.probabilities()[0] + 1.0) / 32.0).abs() < 1e-12);
        assert!((joint.get(5, 7) - x.probabilities()[5] / 32.0).abs() < 1e-12);
    }

    #[test]
    fn co_occurrence_of_an_image_with_itself_is_diagonal() {
        let image = gradient(8, 32);
        let joint = co_occurrence_pmf(&image, &image, bins(32), BinLayout::Full).unwrap();
        let marginal = marginal_pmf(&image, bins(32), BinLayout::Full).unwrap();
        assert!((joint.sum() - 1.0).abs() < 1e-9);
        for i in 0..joint.rows() {
            for j in 0..joint.cols() {
                let expected = if i == j { marginal.probabilities()[i] } else { 0.0 };
                assert!((joint.get(i, j) - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn co_occurrence_requires_equal_shapes() {
        let a = gradient(2, 3);
        let b = gradient(3, 2);
        assert!(matches!(
            co_occurrence_pmf(&a, &b, bins(1), BinLayout::Full),
            Err(AlignError::Shape(_))
        ));
    }
}
