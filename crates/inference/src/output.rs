use crate::backend::{EngineError, OutputTensor};
use crate::error::SessionError;

pub const MAX_OUTPUT_RANK: usize = 4;

/// Result of one inference: flat values plus the engine's output shape.
///
/// The shape always has four entries; dimensions past `rank` are 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub data: Vec<f32>,
    pub shape: [usize; MAX_OUTPUT_RANK],
    pub rank: usize,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            shape: [1; MAX_OUTPUT_RANK],
            rank: 0,
        }
    }
}

impl Output {
    /// Number of values, the product of the shape.
    pub fn total_dim(&self) -> usize {
        self.shape.iter().product()
    }

    /// The first `rank` dimensions.
    pub fn dims(&self) -> &[usize] {
        &self.shape[..self.rank]
    }

    /// Replace the contents with `tensor`, reusing the allocation.
    pub(crate) fn fill_from(&mut self, tensor: OutputTensor<'_>) -> Result<(), SessionError> {
        if tensor.shape.len() > MAX_OUTPUT_RANK {
            return Err(SessionError::Inference(EngineError::new(format!(
                "output rank {} exceeds {MAX_OUTPUT_RANK}",
                tensor.shape.len()
            ))));
        }

        let expected: usize = tensor.shape.iter().product();
        if expected != tensor.data.len() {
            return Err(SessionError::Inference(EngineError::new(format!(
                "output shape {:?} holds {expected} values, engine returned {}",
                tensor.shape,
                tensor.data.len()
            ))));
        }

        self.shape = [1; MAX_OUTPUT_RANK];
        self.shape[..tensor.shape.len()].copy_from_slice(tensor.shape);
        self.rank = tensor.shape.len();
        self.data.clear();
        self.data.extend_from_slice(tensor.data);
        Ok(())
    }
}
