use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;
use crate::view::TensorView;

/// A tensor backed by CPU storage.
///
/// Holds contiguous, row-major f32 data with an associated shape and dtype.
/// Sizes and element strides are reported per dimension, outermost first.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: CpuStorage,
    shape: Shape,
    dtype: DType,
}

impl Tensor {
    /// Create a new tensor from f32 data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {:?} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: CpuStorage::from_f32_vec(data),
            shape,
            dtype: DType::F32,
        }
    }

    /// Fallible variant of [`Tensor::new`].
    pub fn from_f32(data: Vec<f32>, shape: Shape) -> Result<Self> {
        if data.len() != shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: shape.dims().to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor::new(data, shape))
    }

    /// Create a zero-filled tensor with the given shape.
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.numel();
        Tensor {
            storage: CpuStorage::from_f32_vec(vec![0.0; n]),
            shape,
            dtype: DType::F32,
        }
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Size of dimension `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim`.
    pub fn dim(&self, i: usize) -> usize {
        self.shape.dim(i)
    }

    /// Element stride of dimension `i` in the row-major layout.
    ///
    /// # Panics
    /// Panics if `i >= ndim`.
    pub fn stride(&self, i: usize) -> usize {
        self.shape.strides()[i]
    }

    /// Element strides of every dimension.
    pub fn strides(&self) -> Vec<usize> {
        self.shape.strides()
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Returns the underlying data as an f32 slice.
    ///
    /// # Panics
    /// Panics if the storage is not F32. Tensors are only ever built from f32 data.
    pub fn data_f32(&self) -> &[f32] {
        self.storage
            .as_f32_slice()
            .expect("tensor storage is not F32")
    }

    /// Borrow the whole tensor as a strided view.
    pub fn as_view(&self) -> TensorView<'_> {
        TensorView::new(&self.storage, 0, self.shape.clone(), self.shape.strides())
            .expect("tensor data always covers its shape")
    }

    /// Returns the underlying storage reference.
    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }
}
