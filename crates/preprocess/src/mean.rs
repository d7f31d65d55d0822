use crate::error::{PreprocessError, Result};
use ndarray::{Array3, ArrayView2, Axis};
use std::fs;
use std::path::Path;

const HEADER_LEN: usize = 3 * 4;

/// Per-position mean values, planar by output channel: `[channel, y, x]`.
///
/// On disk: three little-endian `u32` (width, height, channel) followed by
/// `width * height * channel` little-endian `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeanArray {
    values: Array3<f32>,
}

impl MeanArray {
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<f32>) -> Result<Self> {
        let shape = (channels as usize, height as usize, width as usize);
        let values = Array3::from_shape_vec(shape, data).map_err(|e| {
            PreprocessError::Config(format!(
                "mean data does not fit {width}x{height}x{channels}: {e}"
            ))
        })?;
        Ok(Self { values })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| PreprocessError::MeanFileIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, path)
    }

    /// Decode a mean file image. `path` is only used in error messages.
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self> {
        let invalid = |reason: String| PreprocessError::MeanFile {
            path: path.to_path_buf(),
            reason,
        };

        if bytes.len() < HEADER_LEN {
            return Err(invalid(format!(
                "{} bytes is shorter than the {HEADER_LEN}-byte header",
                bytes.len()
            )));
        }

        let (header, payload) = bytes.split_at(HEADER_LEN);
        let mut dims = header
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        let (width, height, channels) = match (dims.next(), dims.next(), dims.next()) {
            (Some(w), Some(h), Some(c)) => (w, h, c),
            _ => return Err(invalid("truncated header".to_string())),
        };

        let expected = (width as u64)
            .checked_mul(height as u64)
            .and_then(|n| n.checked_mul(channels as u64))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| invalid("declared dimensions overflow".to_string()))?;
        if payload.len() as u64 != expected {
            return Err(invalid(format!(
                "declared {width}x{height}x{channels} needs {expected} bytes, found {}",
                payload.len()
            )));
        }

        let data = payload
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Self::new(width, height, channels, data)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let (width, height, channels) = self.dims();
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.values.len() * 4);
        for dim in [width, height, channels] {
            bytes.extend_from_slice(&dim.to_le_bytes());
        }
        for value in self.values.iter() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// `(width, height, channels)`.
    pub fn dims(&self) -> (u32, u32, u32) {
        let (c, h, w) = self.values.dim();
        (w as u32, h as u32, c as u32)
    }

    pub fn plane(&self, channel: usize) -> ArrayView2<'_, f32> {
        self.values.index_axis(Axis(0), channel)
    }

    pub fn values(&self) -> &Array3<f32> {
        &self.values
    }
}
