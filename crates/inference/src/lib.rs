//! Model sessions over a pluggable inference engine.
//!
//! A session reads `<model_dir>/<model_name>` files, merges the optional
//! `.config` over the caller's [`ImageInfo`](preprocess::ImageInfo), and runs
//! each image through [`preprocess`] into the engine's single input.

pub mod backend;
pub mod config;
pub mod config_file;
pub mod error;
pub mod model_config;
pub mod output;
pub mod registry;
pub mod session;

pub use backend::{Engine, EngineError, Layout, Precision, TargetDevice};
pub use config::InferenceConfig;
pub use config_file::ConfigFile;
pub use error::SessionError;
pub use model_config::ModelConfig;
pub use output::Output;
pub use registry::{SessionId, SessionRegistry};
pub use session::{InferenceSession, SessionState};
