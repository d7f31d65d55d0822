use crate::crop::crop_windows;
use crate::error::{PreprocessError, Result};
use crate::flip::flip_horizontal;
use crate::image_info::ImageInfo;
use crate::normalize::normalize;
use crate::resize::PixelResizer;
use common::span;
use ndarray::{Array3, Array4, ArrayView3, Axis};

/// Turns one decoded image into the full network input batch:
/// resize, normalize, crop, flip.
pub struct CpuPreProcessor {
    info: ImageInfo,
    resizer: PixelResizer,
}

impl CpuPreProcessor {
    pub fn new(info: ImageInfo) -> Self {
        Self {
            info,
            resizer: PixelResizer::new(),
        }
    }

    pub fn image_info(&self) -> &ImageInfo {
        &self.info
    }

    /// `[batch, channels, height, width]` of every batch this preprocessor
    /// produces.
    pub fn batch_shape(&self) -> [usize; 4] {
        let (w, h) = self.info.window_size();
        [
            self.info.batch_size(),
            self.info.channels() as usize,
            h as usize,
            w as usize,
        ]
    }

    /// Preprocess interleaved 8-bit pixels of any size into a planar batch.
    pub fn preprocess_from_u8_slice(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Array4<f32>> {
        let _s = span!("preprocess_image");

        tracing::trace!(
            width,
            height,
            pixel_bytes = pixels.len(),
            "Preprocessing image dimensions"
        );

        let target = (self.info.width(), self.info.height());
        let resized = self.resizer.resize(pixels, width, height, target)?;
        let normalized = normalize(&resized, &self.info)?;

        assemble_batch(normalized.view(), &self.info)
    }
}

/// Stack crops (or the whole image) and their mirrors along the batch axis.
///
/// Order is interleaved per crop: `crop0, crop0-flipped, crop1, ...`.
pub fn assemble_batch(image: ArrayView3<'_, f32>, info: &ImageInfo) -> Result<Array4<f32>> {
    let _s = span!("assemble_batch");

    let windows = if info.crop().points.is_empty() {
        vec![image]
    } else {
        crop_windows(image, info.crop())?
    };

    let flipped: Vec<Array3<f32>> = if info.flip() {
        windows.iter().map(|w| flip_horizontal(w.view())).collect()
    } else {
        Vec::new()
    };

    let mut entries: Vec<ArrayView3<'_, f32>> = Vec::with_capacity(info.batch_size());
    for (index, window) in windows.iter().enumerate() {
        entries.push(window.view());
        if let Some(mirror) = flipped.get(index) {
            entries.push(mirror.view());
        }
    }

    let batch = ndarray::stack(Axis(0), &entries)
        .map_err(|e| PreprocessError::Config(format!("cannot stack crop windows: {e}")))?;

    if batch.len() != info.batch_len() {
        return Err(PreprocessError::Config(format!(
            "batch holds {} floats, configuration expects {}",
            batch.len(),
            info.batch_len()
        )));
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_info::CropPoint;
    use crate::mean::MeanArray;
    use ndarray::s;

    /// Synthetic BGR image: B = x, G = y, R = (x + y) % 256.
    fn create_test_pixels(width: u32, height: u32) -> Vec<u8> {
        let mut pixels = vec![0u8; (width * height * 3) as usize];
        for y in 0..height {
            for x in 0..width {
                let idx = ((y * width + x) * 3) as usize;
                pixels[idx] = (x % 256) as u8;
                pixels[idx + 1] = (y % 256) as u8;
                pixels[idx + 2] = ((x + y) % 256) as u8;
            }
        }
        pixels
    }

    fn four_crop_info(flip: bool) -> ImageInfo {
        ImageInfo::builder()
            .size(256, 256)
            .crop(
                224,
                224,
                vec![
                    CropPoint::new(0, 0),
                    CropPoint::new(11, 0),
                    CropPoint::new(21, 32),
                    CropPoint::new(32, 32),
                ],
            )
            .flip(flip)
            .build()
            .unwrap()
    }

    #[test]
    fn test_four_crops_with_flip_interleaved() {
        let info = four_crop_info(true);
        let pixels = create_test_pixels(256, 256);
        let mut preprocessor = CpuPreProcessor::new(info.clone());

        let batch = preprocessor
            .preprocess_from_u8_slice(&pixels, 256, 256)
            .unwrap();

        assert_eq!(batch.shape(), &[8, 3, 224, 224]);
        assert_eq!(batch.len(), 8 * 3 * 224 * 224);
        assert_eq!(preprocessor.batch_shape(), [8, 3, 224, 224]);

        let normalized = normalize(&pixels, &info).unwrap();
        for (crop, point) in info.crop().points.iter().enumerate() {
            let (x, y) = (point.x as usize, point.y as usize);
            let expected = normalized.slice(s![.., y..y + 224, x..x + 224]);
            let expected_flip = flip_horizontal(expected);

            assert_eq!(
                batch.index_axis(Axis(0), crop * 2),
                expected,
                "entry {} should be crop {}",
                crop * 2,
                crop
            );
            assert_eq!(
                batch.index_axis(Axis(0), crop * 2 + 1),
                expected_flip,
                "entry {} should be mirrored crop {}",
                crop * 2 + 1,
                crop
            );
        }

        // Plane 0 is R = (x + y) % 256; crop 1 starts at x = 11.
        assert_eq!(batch[[2, 0, 0, 0]], 11.0);
        // Its mirror starts with the last column of the window, x = 234.
        assert_eq!(batch[[3, 0, 0, 0]], 234.0);
    }

    #[test]
    fn test_full_size_crop_reproduces_normalized_image() {
        let info = ImageInfo::builder()
            .size(32, 24)
            .crop(32, 24, vec![CropPoint::new(0, 0)])
            .build()
            .unwrap();
        let pixels = create_test_pixels(32, 24);

        let mut preprocessor = CpuPreProcessor::new(info.clone());
        let batch = preprocessor
            .preprocess_from_u8_slice(&pixels, 32, 24)
            .unwrap();

        let normalized = normalize(&pixels, &info).unwrap();
        assert_eq!(batch.index_axis(Axis(0), 0), normalized);
    }

    #[test]
    fn test_no_crop_uses_whole_image() {
        let info = ImageInfo::builder().size(16, 16).flip(true).build().unwrap();
        let pixels = create_test_pixels(16, 16);

        let mut preprocessor = CpuPreProcessor::new(info);
        let batch = preprocessor
            .preprocess_from_u8_slice(&pixels, 16, 16)
            .unwrap();

        assert_eq!(batch.shape(), &[2, 3, 16, 16]);
        // R plane, row 0: whole image then its mirror
        assert_eq!(batch[[0, 0, 0, 0]], 0.0);
        assert_eq!(batch[[1, 0, 0, 0]], 15.0);
    }

    #[test]
    fn test_resizes_arbitrary_source() {
        let info = four_crop_info(false);
        let pixels = vec![128u8; 640 * 480 * 3];

        let mut preprocessor = CpuPreProcessor::new(info);
        let batch = preprocessor
            .preprocess_from_u8_slice(&pixels, 640, 480)
            .unwrap();

        assert_eq!(batch.shape(), &[4, 3, 224, 224]);
        assert!(batch.iter().all(|v| (v - 128.0).abs() <= 1.0));
    }

    #[test]
    fn test_mean_subtraction_in_batch() {
        let mean = MeanArray::new(8, 8, 3, vec![100.0; 8 * 8 * 3]).unwrap();
        let info = ImageInfo::builder()
            .size(8, 8)
            .scale(2.0)
            .build()
            .unwrap()
            .with_mean(mean)
            .unwrap();
        let pixels = vec![120u8; 8 * 8 * 3];

        let mut preprocessor = CpuPreProcessor::new(info);
        let batch = preprocessor.preprocess_from_u8_slice(&pixels, 8, 8).unwrap();
        assert!(batch.iter().all(|v| *v == 10.0));
    }

    #[test]
    fn test_buffer_size_mismatch_detection() {
        let mut preprocessor = CpuPreProcessor::new(ImageInfo::default());
        let result = preprocessor.preprocess_from_u8_slice(&[0u8; 200], 10, 10);
        assert!(matches!(result, Err(PreprocessError::InvalidImage(_))));
    }
}
