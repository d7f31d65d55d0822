//! In-memory engine used by the integration tests.
#![allow(dead_code)]

use inference::backend::{
    Engine, EngineError, Executable, InferRequest, Layout, ModelFiles, Network, OutputTensor,
    Precision, TargetDevice,
};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Shared observation points for a [`FakeEngine`] and everything it creates.
#[derive(Debug, Default)]
pub struct FakeState {
    pub fail_infer: AtomicBool,
    pub batch_size: AtomicUsize,
    pub infer_calls: AtomicUsize,
    pub last_input: Mutex<Vec<f32>>,
    pub input_format: Mutex<Option<(Precision, Layout)>>,
    pub device: Mutex<Option<TargetDevice>>,
}

/// Engine whose network takes `[batch, c, h, w]` and outputs the per-image
/// channel means as `[batch, c]`.
#[derive(Debug, Clone)]
pub struct FakeEngine {
    pub state: Arc<FakeState>,
    image_shape: (usize, usize, usize),
    inputs: Vec<String>,
}

impl FakeEngine {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            state: Arc::new(FakeState::default()),
            image_shape: (channels, height, width),
            inputs: vec!["data".to_string()],
        }
    }

    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn set_fail_infer(&self, fail: bool) {
        self.state.fail_infer.store(fail, Ordering::SeqCst);
    }

    pub fn infer_calls(&self) -> usize {
        self.state.infer_calls.load(Ordering::SeqCst)
    }

    pub fn batch_size(&self) -> usize {
        self.state.batch_size.load(Ordering::SeqCst)
    }

    pub fn last_input(&self) -> Vec<f32> {
        self.state.last_input.lock().unwrap().clone()
    }
}

pub struct FakeNetwork {
    state: Arc<FakeState>,
    image_shape: (usize, usize, usize),
    inputs: Vec<String>,
    batch_size: usize,
}

pub struct FakeExecutable {
    state: Arc<FakeState>,
    image_len: usize,
    channels: usize,
    batch_size: usize,
}

pub struct FakeRequest {
    state: Arc<FakeState>,
    channels: usize,
    input: Vec<f32>,
    output: Vec<f32>,
    output_shape: Vec<usize>,
}

impl Engine for FakeEngine {
    type Network = FakeNetwork;
    type Executable = FakeExecutable;

    fn read_network(&self, files: &ModelFiles) -> Result<FakeNetwork, EngineError> {
        let weights = files.weights.iter();
        for path in std::iter::once(&files.topology).chain(weights) {
            if !path.exists() {
                return Err(EngineError::new(format!(
                    "model file {} not found",
                    path.display()
                )));
            }
        }
        Ok(FakeNetwork {
            state: Arc::clone(&self.state),
            image_shape: self.image_shape,
            inputs: self.inputs.clone(),
            batch_size: 1,
        })
    }

    fn load_network(
        &self,
        network: FakeNetwork,
        device: TargetDevice,
    ) -> Result<FakeExecutable, EngineError> {
        if device != TargetDevice::Cpu {
            return Err(EngineError::new(format!("device {device} not available")));
        }
        *self.state.device.lock().unwrap() = Some(device);
        let (c, h, w) = network.image_shape;
        Ok(FakeExecutable {
            state: network.state,
            image_len: c * h * w,
            channels: c,
            batch_size: network.batch_size,
        })
    }
}

impl Network for FakeNetwork {
    fn inputs(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn outputs(&self) -> Vec<String> {
        vec!["prob".to_string()]
    }

    fn set_input_format(
        &mut self,
        name: &str,
        precision: Precision,
        layout: Layout,
    ) -> Result<(), EngineError> {
        if !self.inputs.iter().any(|i| i == name) {
            return Err(EngineError::new(format!("no input named '{name}'")));
        }
        *self.state.input_format.lock().unwrap() = Some((precision, layout));
        Ok(())
    }

    fn set_output_format(
        &mut self,
        name: &str,
        _precision: Precision,
        _layout: Layout,
    ) -> Result<(), EngineError> {
        if name != "prob" {
            return Err(EngineError::new(format!("no output named '{name}'")));
        }
        Ok(())
    }

    fn set_batch_size(&mut self, batch_size: usize) -> Result<(), EngineError> {
        self.batch_size = batch_size;
        self.state.batch_size.store(batch_size, Ordering::SeqCst);
        Ok(())
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Executable for FakeExecutable {
    type Request = FakeRequest;

    fn create_request(&self) -> Result<FakeRequest, EngineError> {
        Ok(FakeRequest {
            state: Arc::clone(&self.state),
            channels: self.channels,
            input: vec![0.0; self.batch_size * self.image_len],
            output: Vec::new(),
            output_shape: vec![self.batch_size, self.channels],
        })
    }
}

impl InferRequest for FakeRequest {
    fn input_mut(&mut self, name: &str) -> Result<&mut [f32], EngineError> {
        if name != "data" {
            return Err(EngineError::new(format!("no input named '{name}'")));
        }
        Ok(&mut self.input)
    }

    fn infer(&mut self) -> Result<(), EngineError> {
        self.state.infer_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_infer.load(Ordering::SeqCst) {
            return Err(EngineError::new("device lost"));
        }
        *self.state.last_input.lock().unwrap() = self.input.clone();

        let batch = self.output_shape[0];
        let plane_len = self.input.len() / (batch * self.channels);
        self.output = self
            .input
            .chunks(plane_len)
            .map(|plane| plane.iter().sum::<f32>() / plane_len as f32)
            .collect();
        Ok(())
    }

    fn output(&self, name: &str) -> Result<OutputTensor<'_>, EngineError> {
        if name != "prob" {
            return Err(EngineError::new(format!("no output named '{name}'")));
        }
        Ok(OutputTensor {
            data: &self.output,
            shape: &self.output_shape,
        })
    }
}

/// Model directory holding `model.xml`, `model.bin` and, optionally,
/// `model.config`.
pub fn model_dir(config: Option<&str>) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("model.xml"), b"<net/>").unwrap();
    fs::write(dir.path().join("model.bin"), b"").unwrap();
    if let Some(text) = config {
        fs::write(dir.path().join("model.config"), text).unwrap();
    }
    dir
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) {
    fs::write(dir.join(name), bytes).unwrap();
}

/// Interleaved 3-channel image where byte 0 is `x`, byte 1 is `y` and
/// byte 2 is `fill`.
pub fn gradient_pixels(width: u32, height: u32, fill: u8) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, fill]);
        }
    }
    pixels
}
