use std::fmt::Debug;

use crate::dtype::DType;
use crate::error::Result;
use crate::shape::Shape;
use crate::storage::CpuStorage;
use crate::tensor::Tensor;
use crate::view::TensorViewMut;

/// Trait for pluggable compute backends (CPU, Metal, CUDA, etc.).
///
/// This is the capability set consumers such as the KV cache rely on:
/// buffer allocation, materializing host data, and copying a tensor into a
/// window of an existing buffer. Addressing (sizes, strides, views) is
/// described by [`Tensor`] and [`TensorViewMut`] and is backend-agnostic.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu", "metal").
    fn name(&self) -> &str;

    /// Allocate a zero-initialized buffer of `n` elements of `dtype`.
    fn zeros(&self, dtype: DType, n: usize) -> Result<CpuStorage>;

    /// Build a tensor from raw f32 data.
    ///
    /// Fails if `data.len()` does not match `shape.numel()`.
    fn from_f32_slice(&self, data: &[f32], shape: Shape) -> Result<Tensor>;

    /// Copy the contents of `src` into the window `dst`.
    ///
    /// Element counts must match; shapes may differ (the copy is row-major
    /// on both sides). Backends with their own scheduling may queue the copy
    /// instead of running it immediately, but it must be complete before any
    /// read of the destination they schedule later.
    fn copy(&self, src: &Tensor, dst: TensorViewMut<'_>) -> Result<()>;
}
