use half::f16;

use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::view::{TensorView, TensorViewMut};

/// CPU-side tensor storage.
///
/// A flat, owned buffer of elements. Views over a storage are built with
/// [`CpuStorage::view`] and [`CpuStorage::view_mut`] and never copy.
#[derive(Debug, Clone)]
pub enum CpuStorage {
    /// 32-bit floating point storage.
    F32(Vec<f32>),
    /// 16-bit floating point storage.
    F16(Vec<f16>),
}

impl CpuStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F16(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the buffer in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.dtype().size_in_bytes()
    }

    /// Returns the data as an f32 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F32.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        match self {
            CpuStorage::F32(v) => Ok(v.as_slice()),
            other => Err(TensorError::UnsupportedDType(format!(
                "expected f32 storage, got {}",
                other.dtype()
            ))),
        }
    }

    /// Create zero-filled storage for the given dtype and element count.
    pub fn zeros(dtype: DType, n: usize) -> Result<Self> {
        match dtype {
            DType::F32 => Ok(CpuStorage::F32(vec![0.0; n])),
            DType::F16 => Ok(CpuStorage::F16(vec![f16::ZERO; n])),
        }
    }

    /// Create storage from an f32 vector.
    pub fn from_f32_vec(data: Vec<f32>) -> Self {
        CpuStorage::F32(data)
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F16(_) => DType::F16,
        }
    }

    /// Reads element `i` widened to f32.
    pub fn get_f32(&self, i: usize) -> Option<f32> {
        match self {
            CpuStorage::F32(v) => v.get(i).copied(),
            CpuStorage::F16(v) => v.get(i).map(|x| x.to_f32()),
        }
    }

    /// Writes `value` at element `i`, narrowing to the storage dtype.
    pub fn set_f32(&mut self, i: usize, value: f32) -> Result<()> {
        let len = self.len();
        let oob = TensorError::OutOfBounds { end: i, len };
        match self {
            CpuStorage::F32(v) => *v.get_mut(i).ok_or(oob)? = value,
            CpuStorage::F16(v) => *v.get_mut(i).ok_or(oob)? = f16::from_f32(value),
        }
        Ok(())
    }

    /// Borrow a strided window of this storage.
    pub fn view(&self, offset: usize, shape: Shape, strides: Vec<usize>) -> Result<TensorView<'_>> {
        TensorView::new(self, offset, shape, strides)
    }

    /// Mutably borrow a strided window of this storage.
    pub fn view_mut(
        &mut self,
        offset: usize,
        shape: Shape,
        strides: Vec<usize>,
    ) -> Result<TensorViewMut<'_>> {
        TensorViewMut::new(self, offset, shape, strides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32_vec() {
        let s = CpuStorage::from_f32_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.len(), 3);
        assert!(!s.is_empty());
        assert_eq!(s.as_f32_slice().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_zeros_f32() {
        let s = CpuStorage::zeros(DType::F32, 5).unwrap();
        assert_eq!(s.len(), 5);
        assert_eq!(s.size_in_bytes(), 20);
        assert_eq!(s.as_f32_slice().unwrap(), &[0.0; 5]);
    }

    #[test]
    fn test_zeros_f16() {
        let s = CpuStorage::zeros(DType::F16, 4).unwrap();
        assert_eq!(s.dtype(), DType::F16);
        assert_eq!(s.size_in_bytes(), 8);
        assert_eq!(s.get_f32(3), Some(0.0));
        assert!(s.as_f32_slice().is_err());
    }

    #[test]
    fn test_dtype() {
        let s = CpuStorage::from_f32_vec(vec![]);
        assert_eq!(s.dtype(), DType::F32);
    }

    #[test]
    fn test_set_get_f16() {
        let mut s = CpuStorage::zeros(DType::F16, 2).unwrap();
        s.set_f32(1, 1.5).unwrap();
        assert_eq!(s.get_f32(1), Some(1.5));
        assert!(s.set_f32(2, 1.0).is_err());
        assert_eq!(s.get_f32(2), None);
    }
}
