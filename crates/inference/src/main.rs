use anyhow::Context;
use common::{TelemetryGuard, setup_logging};
use inference::backend::ort::OrtEngine;
use inference::{InferenceConfig, InferenceSession, ModelConfig};
use preprocess::{ChannelOrder, ImageInfo};

const PREVIEW_VALUES: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = InferenceConfig::from_env()?;

    let _telemetry = match &config.otel_endpoint {
        Some(endpoint) => Some(TelemetryGuard::init(
            "inference",
            endpoint,
            config.environment,
        )?),
        None => {
            setup_logging(config.environment);
            None
        }
    };

    tracing::info!(config = ?config, "Loaded configuration");

    let image = image::open(&config.image_path)
        .with_context(|| format!("failed to decode {}", config.image_path.display()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    tracing::info!(width, height, "Decoded input image");

    let image_info = ImageInfo::builder()
        .channel_order(ChannelOrder::Rgb)
        .build()?;
    let model = ModelConfig::new(&config.model_dir, &config.model_name)
        .with_device(config.device)
        .with_image_info(image_info);

    let engine = OrtEngine::new(config.intra_threads);
    let mut session = InferenceSession::create(engine, model)?;
    session.build()?;

    let output = session.infer(image.as_raw(), width, height)?;
    let preview = &output.data[..output.data.len().min(PREVIEW_VALUES)];
    tracing::info!(
        shape = ?output.dims(),
        values = output.total_dim(),
        leading = ?preview,
        "Inference complete"
    );

    Ok(())
}
