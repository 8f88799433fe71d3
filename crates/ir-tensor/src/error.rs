use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },
    #[error("view out of bounds: last element {end} exceeds buffer length {len}")]
    OutOfBounds { end: usize, len: usize },
    #[error("unsupported dtype: {0}")]
    UnsupportedDType(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
