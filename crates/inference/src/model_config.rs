use crate::backend::{Layout, Precision, TargetDevice};
use crate::error::SessionError;
use preprocess::ImageInfo;
use std::fmt;
use std::path::PathBuf;

/// Everything needed to build one inference session.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub model_name: String,
    pub device: TargetDevice,
    pub input_precision: Precision,
    /// Planar data is written, so NCHW unless the engine is told otherwise.
    pub input_layout: Layout,
    pub output_precision: Precision,
    pub output_layout: Layout,
    pub image_info: Option<ImageInfo>,
}

impl ModelConfig {
    pub fn new(model_dir: impl Into<PathBuf>, model_name: impl Into<String>) -> Self {
        Self {
            model_dir: model_dir.into(),
            model_name: model_name.into(),
            device: TargetDevice::Cpu,
            input_precision: Precision::Fp32,
            input_layout: Layout::Nchw,
            output_precision: Precision::Fp32,
            output_layout: Layout::Nc,
            image_info: None,
        }
    }

    pub fn with_image_info(mut self, info: ImageInfo) -> Self {
        self.image_info = Some(info);
        self
    }

    pub fn with_device(mut self, device: TargetDevice) -> Self {
        self.device = device;
        self
    }

    pub fn with_input_format(mut self, precision: Precision, layout: Layout) -> Self {
        self.input_precision = precision;
        self.input_layout = layout;
        self
    }

    pub fn with_output_format(mut self, precision: Precision, layout: Layout) -> Self {
        self.output_precision = precision;
        self.output_layout = layout;
        self
    }

    /// Required fields: model directory, model name, image info.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.model_dir.as_os_str().is_empty() {
            return Err(SessionError::Config("model directory is empty".to_string()));
        }
        if self.model_name.trim().is_empty() {
            return Err(SessionError::Config("model name is empty".to_string()));
        }
        if self.image_info.is_none() {
            return Err(SessionError::Config(format!(
                "model '{}' has no image info",
                self.model_name
            )));
        }
        Ok(())
    }

    /// `<model_dir>/<model_name>.<extension>`
    pub fn model_file(&self, extension: &str) -> PathBuf {
        self.model_dir
            .join(format!("{}.{}", self.model_name, extension))
    }

    pub fn config_file(&self) -> PathBuf {
        self.model_file("config")
    }

    /// Key/value dump logged when a session is built.
    pub(crate) fn write_dump(
        &self,
        f: &mut fmt::Formatter<'_>,
        image_info: Option<&ImageInfo>,
    ) -> fmt::Result {
        writeln!(f, "modelDir:{}", self.model_dir.display())?;
        writeln!(f, "modelName:{}", self.model_name)?;
        writeln!(f, "device:{}", self.device)?;
        writeln!(f, "input:{} {}", self.input_precision, self.input_layout)?;
        write!(f, "output:{} {}", self.output_precision, self.output_layout)?;
        if let Some(info) = image_info {
            write!(f, "\n{info}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_dump(f, self.image_info.as_ref())
    }
}
