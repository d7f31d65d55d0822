//! Image preprocessing for multi-crop network inputs.
//!
//! A decoded 8-bit image of any size is resized to the configured target,
//! mean-normalized into planar `[3, H, W]` floats, cut into crop windows,
//! optionally mirrored, and stacked into one `[batch, 3, h, w]` tensor.

pub mod cpu;
pub mod crop;
pub mod error;
pub mod flip;
pub mod image_info;
pub mod mean;
pub mod normalize;
pub mod resize;

pub use cpu::{CpuPreProcessor, assemble_batch};
pub use error::PreprocessError;
pub use image_info::{
    CHANNELS, ChannelOrder, CropPoint, CropSpec, ImageInfo, ImageInfoBuilder, MAX_CROP_POINTS,
};
pub use mean::MeanArray;
