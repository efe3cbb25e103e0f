// Boundary I/O: raster files in, raster files out. Nothing in the scan loop touches disk.

pub mod image_helper {
    use crate::core_modules::image_grid::{IntensityImage, RGB_CHANNELS, RgbImage, Sample};
    use crate::error::Result;
    use image::ImageEncoder;
    use std::fs;
    use std::path::Path;

    /// Reads any raster format the `image` crate decodes into a channel-last RGB grid.
    pub fn load(path: &Path) -> Result<RgbImage> {
        let rgb = image::open(path)?.into_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let samples = rgb.into_raw().into_iter().map(Sample::from).collect();
        RgbImage::from_vec(height, width, samples)
    }

    /// Writes a single-channel image as an 8-bit grayscale PNG.
    ///
    /// Samples are clamped to [0, 255] and truncated, matching how the histograms
    /// read intensities.
    pub fn save(image: &IntensityImage, path: &Path) -> Result<()> {
        let buffer: Vec<u8> = image.samples().iter().map(|&s| to_byte(s)).collect();
        write_png(
            path,
            &buffer,
            image.width(),
            image.height(),
            image::ExtendedColorType::L8,
        )
    }

    /// Writes a three-channel image as an 8-bit RGB PNG.
    pub fn save_rgb(image: &RgbImage, path: &Path) -> Result<()> {
        let buffer: Vec<u8> = image.samples().iter().map(|&s| to_byte(s)).collect();
        debug_assert_eq!(buffer.len(), image.width() * image.height() * RGB_CHANNELS);
        write_png(
            path,
            &buffer,
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
    }

    #[inline]
    fn to_byte(sample: Sample) -> u8 {
        if sample.is_nan() {
            0
        } else {
            sample.clamp(0.0, 255.0) as u8
        }
    }

    fn write_png(
        path: &Path,
        buffer: &[u8],
        width: usize,
        height: usize,
        color: image::ExtendedColorType,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let output = fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);
        encoder.write_image(buffer, width as u32, height as u32, color)?;
        Ok(())
    }
}
