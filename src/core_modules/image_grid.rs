// THEORY:
// The `image_grid` module holds the two "dumb" data containers the rest of the engine
// passes around. Like a `Chunk`, neither knows anything about registration; they only
// know their own shape and how to hand out samples.
//
// - `IntensityImage` is a single-channel grid of real-valued samples, row-major.
// - `RgbImage` is a three-channel grid with a channel-last layout, the shape an
//   RGB raster has straight out of the decoder.
//
// Every transform produces a new grid. Nothing here is shared mutably between stages.

use crate::error::{AlignError, Result};

pub const RGB_CHANNELS: usize = 3;

pub type Sample = f64;

/// A single-channel grid of intensity samples, nominally in [0, 255].
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityImage {
    /// Number of rows.
    height: usize,
    /// Number of columns.
    width: usize,
    /// Row-major samples, `height * width` long.
    samples: Vec<Sample>,
}

impl IntensityImage {
    pub fn from_vec(height: usize, width: usize, samples: Vec<Sample>) -> Result<Self> {
        if samples.len() != height * width {
            return Err(AlignError::shape(format!(
                "expected {} samples for a {height}x{width} image, got {}",
                height * width,
                samples.len()
            )));
        }
        Ok(Self {
            height,
            width,
            samples,
        })
    }

    /// Builds an image by evaluating `f(row, col)` for every position.
    pub fn from_fn(height: usize, width: usize, mut f: impl FnMut(usize, usize) -> Sample) -> Self {
        let mut samples = Vec::with_capacity(height * width);
        for row in 0..height {
            for col in 0..width {
                samples.push(f(row, col));
            }
        }
        Self {
            height,
            width,
            samples,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Sample {
        self.samples[row * self.width + col]
    }

    pub fn row(&self, row: usize) -> &[Sample] {
        let start = row * self.width;
        &self.samples[start..start + self.width]
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Drops `left` columns from the left edge and `right` columns from the right edge.
    pub fn crop_columns(&self, left: usize, right: usize) -> Result<Self> {
        if left + right >= self.width {
            return Err(AlignError::shape(format!(
                "cannot remove {} columns from an image {} columns wide",
                left + right,
                self.width
            )));
        }
        let width = self.width - left - right;
        Ok(Self::from_fn(self.height, width, |row, col| {
            self.get(row, col + left)
        }))
    }
}

/// A three-channel (red, green, blue) grid of samples, channel-last.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    height: usize,
    width: usize,
    samples: Vec<Sample>,
}

impl RgbImage {
    pub fn from_vec(height: usize, width: usize, samples: Vec<Sample>) -> Result<Self> {
        let expected = height * width * RGB_CHANNELS;
        if samples.len() != expected {
            return Err(AlignError::shape(format!(
                "expected {expected} samples for a {height}x{width}x{RGB_CHANNELS} image, got {}",
                samples.len()
            )));
        }
        Ok(Self {
            height,
            width,
            samples,
        })
    }

    /// Interleaves three equally sized planes into one RGB image.
    pub fn from_channels(
        red: &IntensityImage,
        green: &IntensityImage,
        blue: &IntensityImage,
    ) -> Result<Self> {
        let (height, width) = (red.height(), red.width());
        for plane in [green, blue] {
            if plane.height() != height || plane.width() != width {
                return Err(AlignError::shape(format!(
                    "channel planes disagree: {height}x{width} vs {}x{}",
                    plane.height(),
                    plane.width()
                )));
            }
        }
        let mut samples = Vec::with_capacity(height * width * RGB_CHANNELS);
        for ((r, g), b) in red
            .samples()
            .iter()
            .zip(green.samples())
            .zip(blue.samples())
        {
            samples.extend_from_slice(&[*r, *g, *b]);
        }
        Ok(Self {
            height,
            width,
            samples,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> [Sample; RGB_CHANNELS] {
        let start = (row * self.width + col) * RGB_CHANNELS;
        [
            self.samples[start],
            self.samples[start + 1],
            self.samples[start + 2],
        ]
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Applies `f` to every sample, producing a new image.
    pub fn map_samples(&self, f: impl FnMut(Sample) -> Sample) -> Self {
        Self {
            height: self.height,
            width: self.width,
            samples: self.samples.iter().copied().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(IntensityImage::from_vec(2, 3, vec![0.0; 5]).is_err());
        assert!(RgbImage::from_vec(2, 2, vec![0.0; 8]).is_err());
        assert!(RgbImage::from_vec(2, 2, vec![0.0; 12]).is_ok());
    }

    #[test]
    fn crop_columns_keeps_the_middle() {
        let image = IntensityImage::from_fn(2, 6, |row, col| (row * 10 + col) as f64);
        let cropped = image.crop_columns(2, 1).unwrap();
        assert_eq!(cropped.width(), 3);
        assert_eq!(cropped.row(0), &[2.0, 3.0, 4.0]);
        assert_eq!(cropped.row(1), &[12.0, 13.0, 14.0]);
        assert!(image.crop_columns(3, 3).is_err());
    }

    #[test]
    fn channels_interleave_channel_last() {
        let red = IntensityImage::from_fn(1, 2, |_, col| col as f64);
        let green = IntensityImage::from_fn(1, 2, |_, col| 10.0 + col as f64);
        let blue = IntensityImage::from_fn(1, 2, |_, col| 20.0 + col as f64);
        let rgb = RgbImage::from_channels(&red, &green, &blue).unwrap();
        assert_eq!(rgb.samples(), &[0.0, 10.0, 20.0, 1.0, 11.0, 21.0]);
        assert_eq!(rgb.pixel(0, 1), [1.0, 11.0, 21.0]);
    }
}
