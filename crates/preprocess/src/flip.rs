use ndarray::{Array3, ArrayView3, ArrayViewMut3, Axis};

/// Mirror every row of every plane in place: column `c` swaps with
/// `width - 1 - c`.
pub fn flip_horizontal_inplace(mut window: ArrayViewMut3<'_, f32>) {
    let width = window.len_of(Axis(2));
    for mut plane in window.outer_iter_mut() {
        for mut row in plane.outer_iter_mut() {
            for c in 0..width / 2 {
                row.swap(c, width - 1 - c);
            }
        }
    }
}

/// Mirrored copy of a planar `[channels, height, width]` window.
pub fn flip_horizontal(window: ArrayView3<'_, f32>) -> Array3<f32> {
    let mut flipped = window.as_standard_layout().into_owned();
    flip_horizontal_inplace(flipped.view_mut());
    flipped
}
