use thiserror::Error;

use crate::layer_store::StoreKind;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("context length exceeded (capacity: {capacity}, pos: {pos}, batch size: {batch_size})")]
    CapacityExceeded {
        capacity: usize,
        pos: usize,
        batch_size: usize,
    },
    #[error("inconsistent batch sizes (layer: {layer}, batch size: {expected}, layer batch size: {got})")]
    BatchSizeMismatch {
        layer: usize,
        expected: usize,
        got: usize,
    },
    #[error("{kind} store for layer {layer} holds slots of shape {expected:?}, got {got:?}")]
    LayerShapeMismatch {
        layer: usize,
        kind: StoreKind,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("put called before start_forward")]
    NoForwardPass,
    #[error("cache is closed")]
    Closed,
    #[error("invalid cache config: {0}")]
    InvalidConfig(String),
    #[error("tensor error: {0}")]
    TensorError(#[from] ir_tensor::TensorError),
}

impl CacheError {
    /// Returns true if the current forward pass cannot continue.
    ///
    /// Fatal errors are never retried internally: the caller has to grow the
    /// capacity or fix its batching first.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CacheError::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
