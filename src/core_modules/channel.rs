// THEORY:
// Channel extraction is the first step of the engine. The source raster carries two
// views of the same scene in two colour channels; registration compares them as
// independent single-channel images. Extraction keeps one channel and discards the
// others, returning a plain `IntensityImage` of the same spatial size.

use crate::core_modules::image_grid::{IntensityImage, RgbImage};
use crate::error::{AlignError, Result};

/// A colour channel of an RGB image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }

    pub fn from_index(index: usize) -> Result<Self> {
        match index {
            0 => Ok(Channel::Red),
            1 => Ok(Channel::Green),
            2 => Ok(Channel::Blue),
            other => Err(AlignError::shape(format!(
                "channel index {other} does not exist in an RGB image"
            ))),
        }
    }
}

/// Keeps `channel` of `image` as a single-channel grid.
pub fn extract(image: &RgbImage, channel: Channel) -> IntensityImage {
    let index = channel.index();
    IntensityImage::from_fn(image.height(), image.width(), |row, col| {
        image.pixel(row, col)[index]
    })
}

/// Index-based form of [`extract`]; red=0, green=1, blue=2.
pub fn extract_index(image: &RgbImage, channel_index: usize) -> Result<IntensityImage> {
    Ok(extract(image, Channel::from_index(channel_index)?))
}
