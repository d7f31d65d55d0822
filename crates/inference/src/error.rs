use crate::backend::EngineError;
use crate::registry::SessionId;
use preprocess::PreprocessError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config file {}:{line}: {reason}", .path.display())]
    ConfigFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Config file {}: {source}", .path.display())]
    ConfigFileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Mean file error: {0}")]
    MeanFile(#[source] PreprocessError),

    #[error("Model load failed: {0}")]
    ModelLoad(#[source] EngineError),

    #[error("Geometry error: {0}")]
    Geometry(#[source] PreprocessError),

    #[error("Input batch holds {actual} floats, engine input '{input}' expects {expected}")]
    BatchMismatch {
        input: String,
        expected: usize,
        actual: usize,
    },

    #[error("Inference failed: {0}")]
    Inference(#[source] EngineError),

    #[error("Session is not ready, build() has not completed")]
    NotReady,

    #[error("Session is already built")]
    AlreadyBuilt,

    #[error("Unknown session id {0}")]
    UnknownSession(SessionId),

    #[error("Invalid input image: {0}")]
    Preprocess(#[source] PreprocessError),
}

impl From<PreprocessError> for SessionError {
    fn from(err: PreprocessError) -> Self {
        match err {
            PreprocessError::Config(msg) => SessionError::Config(msg),
            e @ PreprocessError::Geometry { .. } => SessionError::Geometry(e),
            e @ (PreprocessError::MeanFile { .. } | PreprocessError::MeanFileIo { .. }) => {
                SessionError::MeanFile(e)
            }
            e @ (PreprocessError::InvalidImage(_) | PreprocessError::Resize(_)) => {
                SessionError::Preprocess(e)
            }
        }
    }
}

impl SessionError {
    /// Errors after which the session is still usable for the next call.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::Inference(_) | SessionError::Preprocess(_) | SessionError::NotReady
        )
    }
}
