use crate::error::{PreprocessError, Result};
use crate::image_info::{CHANNELS, ChannelOrder, ImageInfo};
use crate::mean::MeanArray;
use common::span;
use ndarray::Array3;

/// Convert interleaved target-size pixels into a planar `[3, height, width]`
/// tensor using the settings in `info`.
pub fn normalize(pixels: &[u8], info: &ImageInfo) -> Result<Array3<f32>> {
    normalize_pixels(
        pixels,
        (info.width(), info.height()),
        info.channel_order(),
        info.mean(),
        info.scale(),
    )
}

/// Planar conversion with optional mean subtraction.
///
/// With a mean array: `(pixel - mean[plane, y, x]) / scale`.
/// Without one: the raw pixel magnitude, `scale` is not applied.
/// Plane `p` always reads source channel `order.plane_sources()[p]`.
pub fn normalize_pixels(
    pixels: &[u8],
    (width, height): (u32, u32),
    order: ChannelOrder,
    mean: Option<&MeanArray>,
    scale: f32,
) -> Result<Array3<f32>> {
    let _s = span!("normalize");

    let (w, h) = (width as usize, height as usize);
    if pixels.len() != w * h * CHANNELS as usize {
        return Err(PreprocessError::InvalidImage(format!(
            "expected {} bytes for {}x{}, got {}",
            w * h * CHANNELS as usize,
            width,
            height,
            pixels.len()
        )));
    }
    if let Some(mean) = mean
        && mean.dims() != (width, height, CHANNELS)
    {
        return Err(PreprocessError::Config(format!(
            "mean array {:?} does not match {}x{}x{}",
            mean.dims(),
            width,
            height,
            CHANNELS
        )));
    }

    let sources = order.plane_sources();
    let mut output = Array3::<f32>::zeros((CHANNELS as usize, h, w));

    for (plane_idx, mut plane) in output.outer_iter_mut().enumerate() {
        let src = sources[plane_idx];
        let mean_plane = mean.map(|m| m.plane(plane_idx));

        for ((y, x), value) in plane.indexed_iter_mut() {
            let px = pixels[(y * w + x) * 3 + src] as f32;
            *value = match &mean_plane {
                Some(m) => (px - m[[y, x]]) / scale,
                None => px,
            };
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgr_reorder_without_mean() {
        let pixels = [10u8, 20, 30].repeat(4);
        let out = normalize_pixels(&pixels, (2, 2), ChannelOrder::Bgr, None, 255.0).unwrap();

        assert_eq!(out.dim(), (3, 2, 2));
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(out[[0, y, x]], 30.0);
                assert_eq!(out[[1, y, x]], 20.0);
                assert_eq!(out[[2, y, x]], 10.0);
            }
        }
    }

    #[test]
    fn test_rgb_source_keeps_order() {
        let pixels = [10u8, 20, 30];
        let out = normalize_pixels(&pixels, (1, 1), ChannelOrder::Rgb, None, 1.0).unwrap();
        assert_eq!(out.as_slice().unwrap(), &[10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_zero_mean_scale_boundaries() {
        let pixels = vec![255u8, 255, 255, 0, 0, 0];
        let mean = MeanArray::new(2, 1, 3, vec![0.0; 6]).unwrap();
        let out =
            normalize_pixels(&pixels, (2, 1), ChannelOrder::Bgr, Some(&mean), 255.0).unwrap();

        for plane in 0..3 {
            assert_eq!(out[[plane, 0, 0]], 1.0);
            assert_eq!(out[[plane, 0, 1]], 0.0);
        }
    }

    #[test]
    fn test_mean_is_indexed_by_output_plane() {
        // Source pixel B=10 G=20 R=30; plane 0 (R) subtracts mean plane 0.
        let pixels = [10u8, 20, 30];
        let mean = MeanArray::new(1, 1, 3, vec![5.0, 4.0, 3.0]).unwrap();
        let out = normalize_pixels(&pixels, (1, 1), ChannelOrder::Bgr, Some(&mean), 0.5).unwrap();
        assert_eq!(out.as_slice().unwrap(), &[50.0, 32.0, 14.0]);
    }

    #[test]
    fn test_mean_dimension_mismatch() {
        let pixels = vec![0u8; 4 * 4 * 3];
        let mean = MeanArray::new(2, 2, 3, vec![0.0; 12]).unwrap();
        let result = normalize_pixels(&pixels, (4, 4), ChannelOrder::Bgr, Some(&mean), 1.0);
        assert!(matches!(result, Err(PreprocessError::Config(_))));
    }

    #[test]
    fn test_normalize_uses_image_info() {
        let info = ImageInfo::builder()
            .size(1, 1)
            .scale(2.0)
            .build()
            .unwrap()
            .with_mean(MeanArray::new(1, 1, 3, vec![1.0, 1.0, 1.0]).unwrap())
            .unwrap();
        let out = normalize(&[11, 21, 31], &info).unwrap();
        assert_eq!(out.as_slice().unwrap(), &[15.0, 10.0, 5.0]);
    }
}
