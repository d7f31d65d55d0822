use crate::error::{PreprocessError, Result};
use crate::image_info::{CropPoint, CropSpec};
use common::span_debug;
use ndarray::{Array3, ArrayView3, s};

/// Verify that the `size` window at `point` lies inside `bounds`.
pub fn check_window(
    index: usize,
    point: CropPoint,
    size: (u32, u32),
    bounds: (u32, u32),
) -> Result<()> {
    let fits =
        |offset: u32, extent: u32, limit: u32| offset as u64 + extent as u64 <= limit as u64;

    if fits(point.x, size.0, bounds.0) && fits(point.y, size.1, bounds.1) {
        Ok(())
    } else {
        Err(PreprocessError::Geometry {
            index,
            x: point.x,
            y: point.y,
            crop_width: size.0,
            crop_height: size.1,
            width: bounds.0,
            height: bounds.1,
        })
    }
}

/// Copy one `[channels, size.1, size.0]` window out of a planar image.
pub fn crop_window(
    image: ArrayView3<'_, f32>,
    point: CropPoint,
    size: (u32, u32),
) -> Result<Array3<f32>> {
    let (_, height, width) = image.dim();
    check_window(0, point, size, (width as u32, height as u32))?;
    Ok(window_view(image, point, size).to_owned())
}

/// Views of every crop window in `crop`, in configured order.
///
/// All windows are bounds-checked before any is returned.
pub fn crop_windows<'a>(
    image: ArrayView3<'a, f32>,
    crop: &CropSpec,
) -> Result<Vec<ArrayView3<'a, f32>>> {
    let _s = span_debug!("crop_windows");

    let (_, height, width) = image.dim();
    let size = (crop.width, crop.height);

    for (index, point) in crop.points.iter().enumerate() {
        check_window(index, *point, size, (width as u32, height as u32))?;
    }

    Ok(crop
        .points
        .iter()
        .map(|point| window_view(image.clone(), *point, size))
        .collect())
}

fn window_view(
    image: ArrayView3<'_, f32>,
    point: CropPoint,
    size: (u32, u32),
) -> ArrayView3<'_, f32> {
    let (x, y) = (point.x as usize, point.y as usize);
    let (w, h) = (size.0 as usize, size.1 as usize);
    image.slice_move(s![.., y..y + h, x..x + w])
}
