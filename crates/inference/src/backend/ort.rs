use super::{
    Engine, EngineError, Executable, InferRequest, Layout, ModelFiles, Network, OutputTensor,
    Precision, TargetDevice,
};
use ndarray::{ArrayD, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::{TensorRef, ValueType},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

impl From<ort::Error> for EngineError {
    fn from(e: ort::Error) -> Self {
        EngineError::with_source("ONNX Runtime error", e)
    }
}

/// ONNX Runtime engine. Models are single `<name>.onnx` files.
#[derive(Debug, Clone)]
pub struct OrtEngine {
    intra_threads: usize,
}

impl OrtEngine {
    pub fn new(intra_threads: usize) -> Self {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();
        Self {
            intra_threads: intra_threads.max(1),
        }
    }

    fn session(&self, path: &Path, device: TargetDevice) -> Result<Session, EngineError> {
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.intra_threads)?;

        match device {
            TargetDevice::Gpu => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            TargetDevice::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
            other => {
                return Err(EngineError::new(format!(
                    "device {other} is not supported by the ONNX Runtime backend"
                )));
            }
        }

        let session = builder.commit_from_file(path)?;
        tracing::info!("Model loaded from {}", path.display());
        Ok(session)
    }
}

impl Default for OrtEngine {
    fn default() -> Self {
        Self::new(4)
    }
}

pub struct OrtNetwork {
    model_path: PathBuf,
    inputs: Vec<(String, Vec<i64>)>,
    outputs: Vec<String>,
    batch_size: usize,
}

impl Engine for OrtEngine {
    type Network = OrtNetwork;
    type Executable = OrtExecutable;

    fn model_files(&self, model_dir: &Path, model_name: &str) -> ModelFiles {
        ModelFiles {
            topology: model_dir.join(format!("{model_name}.onnx")),
            weights: None,
        }
    }

    fn read_network(&self, files: &ModelFiles) -> Result<OrtNetwork, EngineError> {
        // Metadata only; the executable session is created per device in
        // load_network.
        let session = self.session(&files.topology, TargetDevice::Cpu)?;

        let inputs = session
            .inputs()
            .iter()
            .map(|input| {
                let dims = match input.dtype() {
                    ValueType::Tensor { shape, .. } => shape.iter().copied().collect(),
                    _ => Vec::new(),
                };
                (input.name().to_string(), dims)
            })
            .collect();
        let outputs = session
            .outputs()
            .iter()
            .map(|output| output.name().to_string())
            .collect();

        Ok(OrtNetwork {
            model_path: files.topology.clone(),
            inputs,
            outputs,
            batch_size: 1,
        })
    }

    fn load_network(
        &self,
        network: OrtNetwork,
        device: TargetDevice,
    ) -> Result<OrtExecutable, EngineError> {
        let (input_name, dims) = network
            .inputs
            .first()
            .cloned()
            .ok_or_else(|| EngineError::new("model has no inputs"))?;

        let mut shape = Vec::with_capacity(dims.len());
        for (axis, dim) in dims.iter().enumerate() {
            match (axis, *dim) {
                (0, _) => shape.push(network.batch_size),
                (_, d) if d > 0 => shape.push(d as usize),
                (axis, _) => {
                    return Err(EngineError::new(format!(
                        "input '{input_name}' has a dynamic dimension on axis {axis}"
                    )));
                }
            }
        }
        if shape.is_empty() {
            return Err(EngineError::new(format!(
                "input '{input_name}' is not a tensor"
            )));
        }

        let session = self.session(&network.model_path, device)?;

        Ok(OrtExecutable {
            session: Arc::new(Mutex::new(session)),
            input_name,
            input_shape: shape,
            outputs: network.outputs,
        })
    }
}

impl Network for OrtNetwork {
    fn inputs(&self) -> Vec<String> {
        self.inputs.iter().map(|(name, _)| name.clone()).collect()
    }

    fn outputs(&self) -> Vec<String> {
        self.outputs.clone()
    }

    fn set_input_format(
        &mut self,
        name: &str,
        precision: Precision,
        layout: Layout,
    ) -> Result<(), EngineError> {
        if precision != Precision::Fp32 || !matches!(layout, Layout::Nchw | Layout::Any) {
            return Err(EngineError::new(format!(
                "input '{name}': only FP32 NCHW is supported, got {precision} {layout}"
            )));
        }
        Ok(())
    }

    fn set_output_format(
        &mut self,
        name: &str,
        precision: Precision,
        _layout: Layout,
    ) -> Result<(), EngineError> {
        if precision != Precision::Fp32 {
            return Err(EngineError::new(format!(
                "output '{name}': only FP32 is supported, got {precision}"
            )));
        }
        Ok(())
    }

    fn set_batch_size(&mut self, batch_size: usize) -> Result<(), EngineError> {
        if let Some((name, dims)) = self.inputs.first()
            && let Some(&fixed) = dims.first()
            && fixed > 0
            && fixed as usize != batch_size
        {
            return Err(EngineError::new(format!(
                "input '{name}' has fixed batch {fixed}, cannot run batch {batch_size}"
            )));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

pub struct OrtExecutable {
    session: Arc<Mutex<Session>>,
    input_name: String,
    input_shape: Vec<usize>,
    outputs: Vec<String>,
}

impl Executable for OrtExecutable {
    type Request = OrtRequest;

    fn create_request(&self) -> Result<OrtRequest, EngineError> {
        Ok(OrtRequest {
            session: Arc::clone(&self.session),
            input_name: self.input_name.clone(),
            input: ArrayD::zeros(IxDyn(&self.input_shape)),
            output_names: self.outputs.clone(),
            outputs: HashMap::new(),
        })
    }
}

pub struct OrtRequest {
    session: Arc<Mutex<Session>>,
    input_name: String,
    input: ArrayD<f32>,
    output_names: Vec<String>,
    outputs: HashMap<String, ArrayD<f32>>,
}

impl InferRequest for OrtRequest {
    fn input_mut(&mut self, name: &str) -> Result<&mut [f32], EngineError> {
        if name != self.input_name {
            return Err(EngineError::new(format!("unknown input '{name}'")));
        }
        self.input
            .as_slice_mut()
            .ok_or_else(|| EngineError::new("input buffer is not contiguous"))
    }

    fn infer(&mut self) -> Result<(), EngineError> {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);

        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(self.input.view())?
        ])?;

        self.outputs.clear();
        for name in &self.output_names {
            let array = outputs[name.as_str()].try_extract_array::<f32>()?;
            self.outputs.insert(name.clone(), array.into_owned());
        }
        Ok(())
    }

    fn output(&self, name: &str) -> Result<OutputTensor<'_>, EngineError> {
        let array = self
            .outputs
            .get(name)
            .ok_or_else(|| EngineError::new(format!("no output '{name}' available")))?;
        let data = array
            .as_slice()
            .ok_or_else(|| EngineError::new(format!("output '{name}' is not contiguous")))?;
        Ok(OutputTensor {
            data,
            shape: array.shape(),
        })
    }
}
