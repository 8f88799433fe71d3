use crate::backend::ComputeBackend;
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;
use crate::tensor::Tensor;
use crate::view::TensorViewMut;

/// Pure-Rust CPU compute backend.
///
/// Executes every request eagerly on host memory. Intended as a reference
/// implementation and fallback.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn zeros(&self, dtype: DType, n: usize) -> Result<CpuStorage> {
        CpuStorage::zeros(dtype, n)
    }

    fn from_f32_slice(&self, data: &[f32], shape: Shape) -> Result<Tensor> {
        Tensor::from_f32(data.to_vec(), shape)
    }

    fn copy(&self, src: &Tensor, mut dst: TensorViewMut<'_>) -> Result<()> {
        if src.numel() != dst.shape().numel() {
            return Err(TensorError::ShapeMismatch {
                expected: dst.shape().dims().to_vec(),
                got: src.shape().dims().to_vec(),
            });
        }
        dst.write_f32(src.data_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn backend() -> CpuBackend {
        CpuBackend::new()
    }

    #[test]
    fn test_name() {
        assert_eq!(backend().name(), "cpu");
    }

    #[test]
    fn test_zeros() {
        let b = backend();
        let s = b.zeros(DType::F32, 3).unwrap();
        assert_eq!(s.as_f32_slice().unwrap(), &[0.0, 0.0, 0.0]);
        let h = b.zeros(DType::F16, 3).unwrap();
        assert_eq!(h.dtype(), DType::F16);
    }

    #[test]
    fn test_from_f32_slice() {
        let b = backend();
        let t = b.from_f32_slice(&[1.0, 2.0], Shape::new(vec![1, 2])).unwrap();
        assert_eq!(t.data_f32(), &[1.0, 2.0]);
        assert!(b.from_f32_slice(&[1.0], Shape::new(vec![2])).is_err());
    }

    #[test]
    fn test_copy_into_offset() {
        let b = backend();
        let mut store = b.zeros(DType::F32, 8).unwrap();
        let src = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        let dst = store
            .view_mut(4, Shape::new(vec![2, 2]), vec![2, 1])
            .unwrap();
        b.copy(&src, dst).unwrap();
        assert_eq!(
            store.as_f32_slice().unwrap(),
            &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_copy_converts_to_f16() {
        let b = backend();
        let mut store = b.zeros(DType::F16, 2).unwrap();
        let src = Tensor::new(vec![0.1, -2.5], Shape::new(vec![2]));
        let dst = store.view_mut(0, Shape::new(vec![2]), vec![1]).unwrap();
        b.copy(&src, dst).unwrap();
        assert_relative_eq!(store.get_f32(0).unwrap(), 0.1, epsilon = 1e-3);
        assert_relative_eq!(store.get_f32(1).unwrap(), -2.5);
    }

    #[test]
    fn test_copy_length_mismatch() {
        let b = backend();
        let mut store = b.zeros(DType::F32, 4).unwrap();
        let src = Tensor::new(vec![1.0, 2.0, 3.0], Shape::new(vec![3]));
        let dst = store.view_mut(0, Shape::new(vec![2]), vec![1]).unwrap();
        assert!(b.copy(&src, dst).is_err());
    }
}
