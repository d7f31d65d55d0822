use crate::backend::{Engine, EngineError, Executable, InferRequest, Network};
use crate::config_file::ConfigFile;
use crate::error::SessionError;
use crate::model_config::ModelConfig;
use crate::output::Output;
use common::{span, span_debug};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use preprocess::{CpuPreProcessor, ImageInfo};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Configuration validated, engine not loaded yet.
    Built,
    /// Network compiled and an inference request allocated.
    Ready,
}

struct SessionMetrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
    failures: Counter<u64>,
}

fn init_metrics(meter_name: &'static str) -> SessionMetrics {
    let meter = global::meter(meter_name);
    let latency_buckets = [
        0.001, 0.002, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0,
    ];
    SessionMetrics {
        duration: meter
            .f64_histogram("inference_duration_seconds")
            .with_description("Time to run one image through preprocess and the engine")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build(),
        requests: meter
            .u64_counter("inference_requests_total")
            .with_description("Total inference calls")
            .build(),
        failures: meter
            .u64_counter("inference_failures_total")
            .with_description("Inference calls that returned an error")
            .build(),
    }
}

type RequestOf<E> = <<E as Engine>::Executable as Executable>::Request;

struct Ready<E: Engine> {
    // Dropped before the executable it was created from.
    request: RequestOf<E>,
    _executable: E::Executable,
    preprocessor: CpuPreProcessor,
    input_name: String,
    output_name: String,
}

/// One model loaded on one device with a single inference request.
///
/// `infer` takes `&mut self`; callers needing parallelism create more
/// sessions.
pub struct InferenceSession<E: Engine> {
    engine: E,
    config: ModelConfig,
    ready: Option<Ready<E>>,
    metrics: SessionMetrics,
}

impl<E: Engine> InferenceSession<E> {
    /// Validate `config` and return a session in the Built state.
    pub fn create(engine: E, config: ModelConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            engine,
            config,
            ready: None,
            metrics: init_metrics("inference"),
        })
    }

    pub fn state(&self) -> SessionState {
        if self.ready.is_some() {
            SessionState::Ready
        } else {
            SessionState::Built
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Merged image settings once Ready, the caller's settings before.
    pub fn image_info(&self) -> Option<&ImageInfo> {
        match &self.ready {
            Some(ready) => Some(ready.preprocessor.image_info()),
            None => self.config.image_info.as_ref(),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.image_info().map_or(1, ImageInfo::batch_size)
    }

    /// Resolve image settings, load the model and allocate the request.
    ///
    /// On failure the session stays Built and `build` may be retried.
    pub fn build(&mut self) -> Result<(), SessionError> {
        if self.ready.is_some() {
            return Err(SessionError::AlreadyBuilt);
        }

        let _s = span!("session_build");
        tracing::info!(
            model_dir = %self.config.model_dir.display(),
            model_name = %self.config.model_name,
            device = %self.config.device,
            "Building inference session"
        );

        let info = self.resolve_image_info()?;
        let ready = self.load_engine(info)?;

        tracing::info!(
            batch_size = ready.preprocessor.image_info().batch_size(),
            input = %ready.input_name,
            output = %ready.output_name,
            "Inference session ready"
        );
        self.ready = Some(ready);
        tracing::info!("Session configuration:\n{}", self);

        Ok(())
    }

    fn resolve_image_info(&self) -> Result<ImageInfo, SessionError> {
        let base = self
            .config
            .image_info
            .as_ref()
            .ok_or_else(|| SessionError::Config("missing image info".to_string()))?;

        let config_path = self.config.config_file();
        let (mut info, mean_overridden) = match ConfigFile::load(&config_path)? {
            Some(file) => {
                tracing::info!(path = %config_path.display(), "Applying model config file");
                let info = file
                    .apply(base.to_builder(), &self.config.model_dir)
                    .build()?;
                (info, file.mean_file.is_some())
            }
            None => {
                tracing::debug!(path = %config_path.display(), "No model config file, using caller settings");
                (base.to_builder().build()?, false)
            }
        };

        // The caller's in-memory mean survives only if the file left meanFile alone
        if info.mean_file().is_some() {
            info.load_mean()?;
        } else if !mean_overridden
            && let Some(mean) = base.mean()
        {
            info = info.with_mean(mean.clone())?;
        }

        Ok(info)
    }

    fn load_engine(&self, info: ImageInfo) -> Result<Ready<E>, SessionError> {
        let files = self
            .engine
            .model_files(&self.config.model_dir, &self.config.model_name);
        let mut network = self
            .engine
            .read_network(&files)
            .map_err(SessionError::ModelLoad)?;

        let inputs = network.inputs();
        let input_name = match inputs.as_slice() {
            [name] => name.clone(),
            other => {
                return Err(SessionError::ModelLoad(EngineError::new(format!(
                    "network must have exactly one input, found {}",
                    other.len()
                ))));
            }
        };
        let output_name = network.outputs().into_iter().next().ok_or_else(|| {
            SessionError::ModelLoad(EngineError::new("network has no outputs"))
        })?;

        network
            .set_input_format(
                &input_name,
                self.config.input_precision,
                self.config.input_layout,
            )
            .map_err(SessionError::ModelLoad)?;
        network
            .set_output_format(
                &output_name,
                self.config.output_precision,
                self.config.output_layout,
            )
            .map_err(SessionError::ModelLoad)?;
        network
            .set_batch_size(info.batch_size())
            .map_err(SessionError::ModelLoad)?;

        let executable = self
            .engine
            .load_network(network, self.config.device)
            .map_err(SessionError::ModelLoad)?;
        let request = executable
            .create_request()
            .map_err(SessionError::ModelLoad)?;

        Ok(Ready {
            request,
            _executable: executable,
            preprocessor: CpuPreProcessor::new(info),
            input_name,
            output_name,
        })
    }

    /// Run one interleaved 8-bit image through the pipeline and the engine.
    pub fn infer(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Output, SessionError> {
        let mut output = Output::default();
        self.infer_into(pixels, width, height, &mut output)?;
        Ok(output)
    }

    /// Same as [`infer`](Self::infer), writing into a caller-owned `Output`.
    pub fn infer_into(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        output: &mut Output,
    ) -> Result<(), SessionError> {
        let ready = self.ready.as_mut().ok_or(SessionError::NotReady)?;
        let model = KeyValue::new("model", self.config.model_name.clone());

        let start = Instant::now();
        self.metrics.requests.add(1, std::slice::from_ref(&model));

        let result = run(ready, pixels, width, height, output);
        match &result {
            Ok(()) => {
                self.metrics
                    .duration
                    .record(start.elapsed().as_secs_f64(), std::slice::from_ref(&model));
            }
            Err(e) => {
                self.metrics.failures.add(1, &[model]);
                tracing::warn!(error = %e, "Inference call failed");
            }
        }
        result
    }
}

fn run<E: Engine>(
    ready: &mut Ready<E>,
    pixels: &[u8],
    width: u32,
    height: u32,
    output: &mut Output,
) -> Result<(), SessionError> {
    let _s = span!("session_infer");

    let batch = ready
        .preprocessor
        .preprocess_from_u8_slice(pixels, width, height)?;
    let values = batch.as_slice().ok_or_else(|| {
        SessionError::Config("preprocessed batch is not contiguous".to_string())
    })?;

    {
        let _s = span_debug!("copy_input");
        let slot = ready
            .request
            .input_mut(&ready.input_name)
            .map_err(SessionError::Inference)?;
        if slot.len() != values.len() {
            return Err(SessionError::BatchMismatch {
                input: ready.input_name.clone(),
                expected: slot.len(),
                actual: values.len(),
            });
        }
        slot.copy_from_slice(values);
    }

    {
        let _s = span!("model_inference");
        ready.request.infer().map_err(SessionError::Inference)?;
    }

    let tensor = ready
        .request
        .output(&ready.output_name)
        .map_err(SessionError::Inference)?;
    output.fill_from(tensor)?;

    tracing::trace!(shape = ?output.dims(), "Inference output");
    Ok(())
}

impl<E: Engine> fmt::Display for InferenceSession<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.config.write_dump(f, self.image_info())
    }
}
