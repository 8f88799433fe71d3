//! `ir-tensor` - Tensor buffers and compute backend contract for inference-runtime.
//!
//! This crate provides:
//! - A `Tensor` type backed by CPU storage
//! - Strided `TensorView` / `TensorViewMut` windows that alias a buffer
//! - A `ComputeBackend` trait for pluggable compute (CPU, Metal, etc.)
//! - A reference `CpuBackend` implementation
//! - Shape utilities and data type definitions (F32, F16)

pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod storage;
pub mod tensor;
pub mod view;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use storage::CpuStorage;
pub use tensor::Tensor;
pub use view::{TensorView, TensorViewMut};
