use crate::error::{PreprocessError, Result};
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use std::borrow::Cow;

/// Resizes interleaved 3-channel 8-bit images with a bilinear convolution.
///
/// Every call uses the same filter so identical inputs produce identical
/// batches.
pub struct PixelResizer {
    resizer: Resizer,
    options: ResizeOptions,
}

impl PixelResizer {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
            options: ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        }
    }

    /// Resize `pixels` (`width * height * 3` bytes) to `target`.
    ///
    /// Returns the input unchanged when it already has the target size.
    pub fn resize<'a>(
        &mut self,
        pixels: &'a [u8],
        width: u32,
        height: u32,
        target: (u32, u32),
    ) -> Result<Cow<'a, [u8]>> {
        let _s = span!("resize");

        check_pixel_buffer(pixels, width, height)?;

        if (width, height) == target {
            return Ok(Cow::Borrowed(pixels));
        }

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)
            .map_err(|e| PreprocessError::Resize(e.to_string()))?;
        let mut resized = Image::new(target.0, target.1, PixelType::U8x3);

        self.resizer
            .resize(&src, &mut resized, &self.options)
            .map_err(|e| PreprocessError::Resize(e.to_string()))?;

        tracing::trace!(
            width,
            height,
            target_width = target.0,
            target_height = target.1,
            "Resized source image"
        );

        Ok(Cow::Owned(resized.buffer().to_vec()))
    }
}

impl Default for PixelResizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject empty images and buffers whose length is not `width * height * 3`.
pub fn check_pixel_buffer(pixels: &[u8], width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(PreprocessError::InvalidImage(format!(
            "image size must be non-zero, got {width}x{height}"
        )));
    }

    let expected = width as usize * height as usize * 3;
    if pixels.len() != expected {
        return Err(PreprocessError::InvalidImage(format!(
            "Buffer size mismatch: expected {} bytes for {}x{} BGR/RGB, got {} bytes",
            expected,
            width,
            height,
            pixels.len()
        )));
    }
    Ok(())
}
