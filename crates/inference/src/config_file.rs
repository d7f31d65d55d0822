//! Parser for the per-model `<name>.config` text file.
//!
//! ```text
//! width_height_channel=256_256_3
//! flip=1
//! meanFile=mean.bin
//! scale=255.0
//! corpW_cropH_cropN=224_224_2
//! x_y=0_0
//! x_y=32_32
//! ```

use crate::error::SessionError;
use preprocess::{CropPoint, ImageInfoBuilder, MAX_CROP_POINTS};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CropLine {
    pub width: u32,
    pub height: u32,
    pub points: Vec<CropPoint>,
}

/// Values present in a config file. Absent keys leave the caller's settings
/// untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub geometry: Option<(u32, u32, u32)>,
    pub flip: Option<bool>,
    /// `Some(None)` when the file sets an empty `meanFile=`.
    pub mean_file: Option<Option<PathBuf>>,
    pub scale: Option<f32>,
    pub crop: Option<CropLine>,
}

struct PendingCrop {
    line: usize,
    expected: usize,
    crop: CropLine,
}

impl ConfigFile {
    /// Read and parse `path`. Returns `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, SessionError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, path).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SessionError::ConfigFileIo {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse config text. `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, SessionError> {
        let error = |line: usize, reason: String| SessionError::ConfigFile {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut file = ConfigFile::default();
        let mut pending: Option<PendingCrop> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| error(line_no, format!("expected key=value, got '{line}'")))?;
            let (key, value) = (key.trim(), value.trim());

            if key == "x_y" {
                let Some(crop) = pending.as_mut() else {
                    return Err(error(line_no, "x_y before any crop size line".to_string()));
                };
                if crop.crop.points.len() == crop.expected {
                    return Err(error(
                        line_no,
                        format!("more than the {} declared crop points", crop.expected),
                    ));
                }
                let [x, y] = parse_fields::<u32, 2>(value).map_err(|r| error(line_no, r))?;
                crop.crop.points.push(CropPoint::new(x, y));
                if crop.crop.points.len() == crop.expected {
                    file.crop = pending.take().map(|p| p.crop);
                }
                continue;
            }

            if let Some(crop) = &pending {
                return Err(error(
                    line_no,
                    format!(
                        "expected {} x_y lines after line {}, found {}",
                        crop.expected,
                        crop.line,
                        crop.crop.points.len()
                    ),
                ));
            }

            match key {
                "width_height_channel" => {
                    let [w, h, c] = parse_fields::<u32, 3>(value).map_err(|r| error(line_no, r))?;
                    if w == 0 || h == 0 || c == 0 {
                        return Err(error(line_no, format!("dimensions must be > 0: {value}")));
                    }
                    file.geometry = Some((w, h, c));
                }
                "flip" => {
                    file.flip = Some(match value {
                        "0" => false,
                        "1" => true,
                        other => return Err(error(line_no, format!("flip must be 0 or 1, got '{other}'"))),
                    });
                }
                "meanFile" => {
                    file.mean_file = Some((!value.is_empty()).then(|| PathBuf::from(value)));
                }
                "scale" => {
                    let [scale] = parse_fields::<f32, 1>(value).map_err(|r| error(line_no, r))?;
                    file.scale = Some(scale);
                }
                "corpW_cropH_cropN" | "cropW_cropH_cropN" => {
                    let [width, height, count] =
                        parse_fields::<u32, 3>(value).map_err(|r| error(line_no, r))?;
                    let count = count as usize;
                    if count > MAX_CROP_POINTS {
                        return Err(error(
                            line_no,
                            format!("{count} crops requested, at most {MAX_CROP_POINTS} supported"),
                        ));
                    }
                    let crop = CropLine {
                        width,
                        height,
                        points: Vec::with_capacity(count),
                    };
                    if count == 0 {
                        file.crop = Some(crop);
                    } else {
                        pending = Some(PendingCrop {
                            line: line_no,
                            expected: count,
                            crop,
                        });
                    }
                }
                other => return Err(error(line_no, format!("unknown key '{other}'"))),
            }
        }

        if let Some(crop) = pending {
            return Err(error(
                crop.line,
                format!(
                    "expected {} x_y lines, file ended after {}",
                    crop.expected,
                    crop.crop.points.len()
                ),
            ));
        }

        Ok(file)
    }

    /// Layer the file's values over `builder`. Relative mean file paths are
    /// resolved against `base_dir`.
    pub fn apply(&self, mut builder: ImageInfoBuilder, base_dir: &Path) -> ImageInfoBuilder {
        if let Some((width, height, channels)) = self.geometry {
            builder = builder.size(width, height).channels(channels);
        }
        if let Some(flip) = self.flip {
            builder = builder.flip(flip);
        }
        if let Some(mean_file) = &self.mean_file {
            // join keeps absolute paths as they are
            let resolved = mean_file.as_ref().map(|p| base_dir.join(p));
            builder = builder.mean_file(resolved);
        }
        if let Some(scale) = self.scale {
            builder = builder.scale(scale);
        }
        if let Some(crop) = &self.crop {
            builder = builder.crop(crop.width, crop.height, crop.points.clone());
        }
        builder
    }
}

/// Split `value` on `_` into exactly `N` numbers.
fn parse_fields<T: FromStr, const N: usize>(value: &str) -> Result<[T; N], String> {
    let parts: Vec<&str> = value.split('_').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!(
            "expected {N} '_'-separated values, got {} in '{value}'",
            parts.len()
        ));
    }

    let mut parsed = Vec::with_capacity(N);
    for part in parts {
        let number = part
            .parse()
            .map_err(|_| format!("'{part}' is not a valid number"))?;
        parsed.push(number);
    }

    parsed
        .try_into()
        .map_err(|_| format!("expected {N} values in '{value}'"))
}
