//! Call contract of the external inference engine.
//!
//! The engine reads a network description, accepts precision/layout/batch
//! settings, compiles it for a device, and hands out requests that expose a
//! writable input buffer, a blocking `infer`, and readable outputs.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[cfg(feature = "ort-backend")]
pub mod ort;

#[derive(Error, Debug)]
#[error("{message}")]
pub struct EngineError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Device the engine compiles the network for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetDevice {
    #[default]
    Cpu,
    Gpu,
    Myriad,
    Fpga,
    Hddl,
    Hetero,
}

/// Element type tag for an input or output blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Fp32,
    Fp16,
    U8,
    I32,
}

/// Memory layout tag for an input or output blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Nchw,
    Nhwc,
    Chw,
    Nc,
    C,
    Any,
}

macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    other => Err(format!(
                        concat!("unknown ", stringify!($ty), " '{}'"),
                        other
                    )),
                }
            }
        }
    };
}

string_enum!(TargetDevice {
    Cpu => "CPU",
    Gpu => "GPU",
    Myriad => "MYRIAD",
    Fpga => "FPGA",
    Hddl => "HDDL",
    Hetero => "HETERO",
});

string_enum!(Precision {
    Fp32 => "FP32",
    Fp16 => "FP16",
    U8 => "U8",
    I32 => "I32",
});

string_enum!(Layout {
    Nchw => "NCHW",
    Nhwc => "NHWC",
    Chw => "CHW",
    Nc => "NC",
    C => "C",
    Any => "ANY",
});

/// Files the engine reads for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub topology: PathBuf,
    pub weights: Option<PathBuf>,
}

/// Borrowed output blob: flat data plus its dimensions.
#[derive(Debug, Clone, Copy)]
pub struct OutputTensor<'a> {
    pub data: &'a [f32],
    pub shape: &'a [usize],
}

pub trait Engine {
    type Network: Network;
    type Executable: Executable;

    /// Paths of the model files inside `model_dir`.
    ///
    /// Defaults to `<name>.xml` topology with `<name>.bin` weights.
    fn model_files(&self, model_dir: &Path, model_name: &str) -> ModelFiles {
        ModelFiles {
            topology: model_dir.join(format!("{model_name}.xml")),
            weights: Some(model_dir.join(format!("{model_name}.bin"))),
        }
    }

    fn read_network(&self, files: &ModelFiles) -> Result<Self::Network, EngineError>;

    /// Compile a configured network for `device`.
    fn load_network(
        &self,
        network: Self::Network,
        device: TargetDevice,
    ) -> Result<Self::Executable, EngineError>;
}

/// Network description before compilation.
pub trait Network {
    fn inputs(&self) -> Vec<String>;

    fn outputs(&self) -> Vec<String>;

    fn set_input_format(
        &mut self,
        name: &str,
        precision: Precision,
        layout: Layout,
    ) -> Result<(), EngineError>;

    fn set_output_format(
        &mut self,
        name: &str,
        precision: Precision,
        layout: Layout,
    ) -> Result<(), EngineError>;

    fn set_batch_size(&mut self, batch_size: usize) -> Result<(), EngineError>;

    fn batch_size(&self) -> usize;
}

pub trait Executable {
    type Request: InferRequest;

    fn create_request(&self) -> Result<Self::Request, EngineError>;
}

/// One execution context. Not shareable between concurrent callers.
pub trait InferRequest {
    /// Writable input blob, sized for the compiled batch.
    fn input_mut(&mut self, name: &str) -> Result<&mut [f32], EngineError>;

    /// Run the network on the current input. Blocks until done.
    fn infer(&mut self) -> Result<(), EngineError>;

    /// Output blob produced by the last successful `infer`.
    fn output(&self, name: &str) -> Result<OutputTensor<'_>, EngineError>;
}
