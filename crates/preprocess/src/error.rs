use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Invalid image configuration: {0}")]
    Config(String),

    #[error(
        "Crop {index} at ({x}, {y}) of size {crop_width}x{crop_height} exceeds {width}x{height} source"
    )]
    Geometry {
        index: usize,
        x: u32,
        y: u32,
        crop_width: u32,
        crop_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Mean file {}: {reason}", .path.display())]
    MeanFile { path: PathBuf, reason: String },

    #[error("Mean file {}: {source}", .path.display())]
    MeanFileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid image buffer: {0}")]
    InvalidImage(String),

    #[error("Resize failed: {0}")]
    Resize(String),
}

pub type Result<T> = std::result::Result<T, PreprocessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_error_names_offending_crop() {
        let err = PreprocessError::Geometry {
            index: 2,
            x: 250,
            y: 250,
            crop_width: 224,
            crop_height: 224,
            width: 256,
            height: 256,
        };
        assert_eq!(
            err.to_string(),
            "Crop 2 at (250, 250) of size 224x224 exceeds 256x256 source"
        );
    }

    #[test]
    fn test_mean_file_io_error_keeps_source() {
        let err = PreprocessError::MeanFileIo {
            path: PathBuf::from("/models/mean.bin"),
            source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
        };
        assert_eq!(err.to_string(), "Mean file /models/mean.bin: file not found");
        assert!(std::error::Error::source(&err).is_some());
    }
}
