use crate::crop::check_window;
use crate::error::{PreprocessError, Result};
use crate::mean::MeanArray;
use std::fmt;
use std::path::{Path, PathBuf};

/// Upper bound on configured crop windows per image.
pub const MAX_CROP_POINTS: usize = 16;

/// The pipeline works on 3-channel 8-bit pixels only.
pub const CHANNELS: u32 = 3;

const DEFAULT_INPUT_SIZE: (u32, u32) = (224, 224);

/// Interleaved channel order of the decoded source pixels.
///
/// Output planes are always R, G, B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Bgr,
    Rgb,
}

impl ChannelOrder {
    /// Source channel index read for each output plane.
    pub fn plane_sources(self) -> [usize; 3] {
        match self {
            ChannelOrder::Bgr => [2, 1, 0],
            ChannelOrder::Rgb => [0, 1, 2],
        }
    }
}

/// Top-left corner of a crop window, in target-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPoint {
    pub x: u32,
    pub y: u32,
}

impl CropPoint {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CropSpec {
    pub width: u32,
    pub height: u32,
    pub points: Vec<CropPoint>,
}

/// Input geometry and normalization settings for one network input.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    width: u32,
    height: u32,
    channels: u32,
    channel_order: ChannelOrder,
    mean_file: Option<PathBuf>,
    mean: Option<MeanArray>,
    scale: f32,
    crop: CropSpec,
    flip: bool,
}

impl ImageInfo {
    pub fn builder() -> ImageInfoBuilder {
        ImageInfoBuilder::default()
    }

    /// Builder seeded with this configuration, used to layer overrides.
    pub fn to_builder(&self) -> ImageInfoBuilder {
        ImageInfoBuilder {
            width: self.width,
            height: self.height,
            channels: self.channels,
            channel_order: self.channel_order,
            mean_file: self.mean_file.clone(),
            scale: self.scale,
            crop: self.crop.clone(),
            flip: self.flip,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn channel_order(&self) -> ChannelOrder {
        self.channel_order
    }

    pub fn mean_file(&self) -> Option<&Path> {
        self.mean_file.as_deref()
    }

    pub fn mean(&self) -> Option<&MeanArray> {
        self.mean.as_ref()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn crop(&self) -> &CropSpec {
        &self.crop
    }

    pub fn crop_count(&self) -> usize {
        self.crop.points.len()
    }

    pub fn flip(&self) -> bool {
        self.flip
    }

    /// Images per inference call: `max(1, crop_count) * (flip ? 2 : 1)`.
    ///
    /// This is the only place the batch size is derived; both the pipeline
    /// and the engine's network batch size use it.
    pub fn batch_size(&self) -> usize {
        self.crop_count().max(1) * if self.flip { 2 } else { 1 }
    }

    /// Width and height of each batch entry.
    pub fn window_size(&self) -> (u32, u32) {
        if self.crop.points.is_empty() {
            (self.width, self.height)
        } else {
            (self.crop.width, self.crop.height)
        }
    }

    /// Number of floats in one full input batch.
    pub fn batch_len(&self) -> usize {
        let (w, h) = self.window_size();
        self.batch_size() * self.channels as usize * h as usize * w as usize
    }

    /// Load the configured mean file, if any, and attach it.
    ///
    /// A mean array whose dimensions differ from the target geometry is
    /// rejected here so normalization never indexes outside it.
    pub fn load_mean(&mut self) -> Result<()> {
        let Some(path) = self.mean_file.clone() else {
            self.mean = None;
            return Ok(());
        };
        let mean = MeanArray::load(&path)?;
        self.attach_mean(mean, &path)
    }

    /// Attach an in-memory mean array.
    pub fn with_mean(mut self, mean: MeanArray) -> Result<Self> {
        let path = self
            .mean_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("<memory>"));
        self.attach_mean(mean, &path)?;
        Ok(self)
    }

    fn attach_mean(&mut self, mean: MeanArray, path: &Path) -> Result<()> {
        let expected = (self.width, self.height, self.channels);
        if mean.dims() != expected {
            return Err(PreprocessError::MeanFile {
                path: path.to_path_buf(),
                reason: format!(
                    "dimensions {:?} do not match target {}x{}x{}",
                    mean.dims(),
                    expected.0,
                    expected.1,
                    expected.2
                ),
            });
        }

        tracing::debug!(
            path = %path.display(),
            width = self.width,
            height = self.height,
            "Mean array attached"
        );
        self.mean = Some(mean);
        Ok(())
    }
}

impl Default for ImageInfo {
    fn default() -> Self {
        Self {
            width: DEFAULT_INPUT_SIZE.0,
            height: DEFAULT_INPUT_SIZE.1,
            channels: CHANNELS,
            channel_order: ChannelOrder::default(),
            mean_file: None,
            mean: None,
            scale: 1.0,
            crop: CropSpec::default(),
            flip: false,
        }
    }
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "width_height_channel:{}_{}_{}",
            self.width, self.height, self.channels
        )?;
        writeln!(f, "flip:{}", u8::from(self.flip))?;
        writeln!(
            f,
            "meanFile:{}",
            self.mean_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )?;
        writeln!(f, "scale:{}", self.scale)?;
        write!(
            f,
            "cropW_cropH_cropN:{}_{}_{}",
            self.crop.width,
            self.crop.height,
            self.crop.points.len()
        )?;
        for point in &self.crop.points {
            write!(f, "\nx_y:{}_{}", point.x, point.y)?;
        }
        Ok(())
    }
}

/// Validating builder for [`ImageInfo`].
#[derive(Debug, Clone)]
pub struct ImageInfoBuilder {
    width: u32,
    height: u32,
    channels: u32,
    channel_order: ChannelOrder,
    mean_file: Option<PathBuf>,
    scale: f32,
    crop: CropSpec,
    flip: bool,
}

impl Default for ImageInfoBuilder {
    fn default() -> Self {
        ImageInfo::default().to_builder()
    }
}

impl ImageInfoBuilder {
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn channels(mut self, channels: u32) -> Self {
        self.channels = channels;
        self
    }

    pub fn channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }

    pub fn mean_file(mut self, path: Option<PathBuf>) -> Self {
        self.mean_file = path;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn crop(mut self, width: u32, height: u32, points: Vec<CropPoint>) -> Self {
        self.crop = CropSpec {
            width,
            height,
            points,
        };
        self
    }

    pub fn flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    pub fn build(self) -> Result<ImageInfo> {
        if self.width == 0 || self.height == 0 {
            return Err(PreprocessError::Config(format!(
                "target size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.channels != CHANNELS {
            return Err(PreprocessError::Config(format!(
                "expected {} channels, got {}",
                CHANNELS, self.channels
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(PreprocessError::Config(format!(
                "scale must be a positive finite number, got {}",
                self.scale
            )));
        }

        let crop = &self.crop;
        if crop.points.len() > MAX_CROP_POINTS {
            return Err(PreprocessError::Config(format!(
                "{} crop points configured, at most {} supported",
                crop.points.len(),
                MAX_CROP_POINTS
            )));
        }
        if !crop.points.is_empty() && (crop.width == 0 || crop.height == 0) {
            return Err(PreprocessError::Config(format!(
                "crop size must be non-zero, got {}x{}",
                crop.width, crop.height
            )));
        }
        for (index, point) in crop.points.iter().enumerate() {
            check_window(
                index,
                *point,
                (crop.width, crop.height),
                (self.width, self.height),
            )?;
        }

        Ok(ImageInfo {
            width: self.width,
            height: self.height,
            channels: self.channels,
            channel_order: self.channel_order,
            mean_file: self.mean_file,
            mean: None,
            scale: self.scale,
            crop: self.crop,
            flip: self.flip,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_crop_points() -> Vec<CropPoint> {
        vec![
            CropPoint::new(0, 0),
            CropPoint::new(11, 0),
            CropPoint::new(21, 32),
            CropPoint::new(32, 32),
        ]
    }

    #[test]
    fn test_batch_size_formula() {
        let cases = [
            (Vec::new(), false, 1),
            (Vec::new(), true, 2),
            (four_crop_points(), false, 4),
            (four_crop_points(), true, 8),
        ];

        for (points, flip, expected) in cases {
            let info = ImageInfo::builder()
                .size(256, 256)
                .crop(224, 224, points)
                .flip(flip)
                .build()
                .unwrap();
            assert_eq!(info.batch_size(), expected);
        }
    }

    #[test]
    fn test_window_size_and_batch_len() {
        let info = ImageInfo::builder()
            .size(256, 256)
            .crop(224, 224, four_crop_points())
            .flip(true)
            .build()
            .unwrap();
        assert_eq!(info.window_size(), (224, 224));
        assert_eq!(info.batch_len(), 8 * 3 * 224 * 224);

        let whole = ImageInfo::builder().size(64, 32).build().unwrap();
        assert_eq!(whole.window_size(), (64, 32));
        assert_eq!(whole.batch_len(), 3 * 64 * 32);
    }

    #[test]
    fn test_rejects_out_of_bounds_crop() {
        let result = ImageInfo::builder()
            .size(256, 256)
            .crop(224, 224, vec![CropPoint::new(250, 250)])
            .build();
        assert!(matches!(
            result,
            Err(PreprocessError::Geometry { index: 0, x: 250, y: 250, .. })
        ));
    }

    #[test]
    fn test_rejects_too_many_crop_points() {
        let points = vec![CropPoint::new(0, 0); MAX_CROP_POINTS + 1];
        let err = ImageInfo::builder()
            .size(256, 256)
            .crop(16, 16, points)
            .build()
            .unwrap_err();
        assert!(matches!(err, PreprocessError::Config(_)));
        assert!(err.to_string().contains("at most"));
    }

    #[test]
    fn test_rejects_invalid_scalars() {
        assert!(ImageInfo::builder().size(0, 10).build().is_err());
        assert!(ImageInfo::builder().channels(1).build().is_err());
        assert!(ImageInfo::builder().scale(0.0).build().is_err());
        assert!(ImageInfo::builder().scale(f32::NAN).build().is_err());
        assert!(
            ImageInfo::builder()
                .crop(0, 10, vec![CropPoint::new(0, 0)])
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_crop_size_without_points_uses_whole_image() {
        let info = ImageInfo::builder()
            .size(32, 32)
            .crop(300, 300, Vec::new())
            .build()
            .unwrap();
        assert_eq!(info.crop_count(), 0);
        assert_eq!(info.window_size(), (32, 32));
    }

    #[test]
    fn test_mean_dimension_mismatch_is_rejected() {
        let info = ImageInfo::builder().size(4, 4).build().unwrap();
        let mean = MeanArray::new(2, 2, 3, vec![0.0; 12]).unwrap();
        let err = info.with_mean(mean).unwrap_err();
        assert!(matches!(err, PreprocessError::MeanFile { .. }));
    }

    #[test]
    fn test_to_builder_round_trips_settings() {
        let info = ImageInfo::builder()
            .size(256, 256)
            .scale(255.0)
            .crop(224, 224, four_crop_points())
            .flip(true)
            .channel_order(ChannelOrder::Rgb)
            .build()
            .unwrap();
        let rebuilt = info.to_builder().build().unwrap();
        assert_eq!(rebuilt.crop(), info.crop());
        assert_eq!(rebuilt.scale(), 255.0);
        assert!(rebuilt.flip());
        assert_eq!(rebuilt.channel_order(), ChannelOrder::Rgb);
    }

    #[test]
    fn test_display_lists_crop_points() {
        let info = ImageInfo::builder()
            .size(256, 256)
            .crop(224, 224, vec![CropPoint::new(11, 0)])
            .build()
            .unwrap();
        let text = info.to_string();
        assert!(text.contains("width_height_channel:256_256_3"));
        assert!(text.contains("cropW_cropH_cropN:224_224_1"));
        assert!(text.ends_with("x_y:11_0"));
    }
}
