use crate::backend::TargetDevice;
use common::{env_opt, env_or};
use std::path::PathBuf;

pub use common::Environment;

/// Settings of the `inference` binary.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub environment: Environment,
    pub model_dir: PathBuf,
    pub model_name: String,
    pub image_path: PathBuf,
    pub device: TargetDevice,
    pub intra_threads: usize,
    pub otel_endpoint: Option<String>,
}

impl InferenceConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let model_dir = PathBuf::from(env_or("MODEL_DIR", "models".to_string()));
        let model_name = env_or("MODEL_NAME", "model".to_string());

        let image_path = env_opt("IMAGE_PATH")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow::anyhow!("IMAGE_PATH must be set"))?;

        let device = match env_opt("DEVICE") {
            Some(value) => value.parse().map_err(anyhow::Error::msg)?,
            None => TargetDevice::Cpu,
        };

        let intra_threads = env_or("INTRA_THREADS", 4);
        let otel_endpoint = env_opt("OTEL_EXPORTER_OTLP_ENDPOINT");

        Ok(Self {
            environment,
            model_dir,
            model_name,
            image_path,
            device,
            intra_threads,
            otel_endpoint,
        })
    }
}
