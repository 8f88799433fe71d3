use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// A read-only strided window into a [`CpuStorage`].
///
/// The view is described by an element offset, per-dimension sizes and
/// per-dimension element strides. It borrows the storage, so it cannot
/// outlive the buffer it addresses and never copies it.
#[derive(Debug, Clone)]
pub struct TensorView<'a> {
    storage: &'a CpuStorage,
    offset: usize,
    shape: Shape,
    strides: Vec<usize>,
}

/// A mutable strided window into a [`CpuStorage`], used as a copy target.
#[derive(Debug)]
pub struct TensorViewMut<'a> {
    storage: &'a mut CpuStorage,
    offset: usize,
    shape: Shape,
    strides: Vec<usize>,
}

/// Checks that every element addressed by (offset, shape, strides) is inside
/// a buffer of `len` elements.
fn check_bounds(len: usize, offset: usize, shape: &Shape, strides: &[usize]) -> Result<()> {
    if strides.len() != shape.ndim() {
        return Err(TensorError::ShapeMismatch {
            expected: vec![shape.ndim()],
            got: vec![strides.len()],
        });
    }
    if shape.numel() == 0 {
        return if offset <= len {
            Ok(())
        } else {
            Err(TensorError::OutOfBounds { end: offset, len })
        };
    }
    let last = offset
        + shape
            .dims()
            .iter()
            .zip(strides)
            .map(|(d, s)| (d - 1) * s)
            .sum::<usize>();
    if last >= len {
        return Err(TensorError::OutOfBounds { end: last, len });
    }
    Ok(())
}

/// Storage offsets of every element of a strided window, in row-major order.
pub(crate) fn element_offsets(base: usize, dims: &[usize], strides: &[usize]) -> Vec<usize> {
    let n: usize = dims.iter().product();
    let mut out = Vec::with_capacity(n);
    if n == 0 {
        return out;
    }
    let mut index = vec![0usize; dims.len()];
    for _ in 0..n {
        out.push(base + index.iter().zip(strides).map(|(i, s)| i * s).sum::<usize>());
        for axis in (0..dims.len()).rev() {
            index[axis] += 1;
            if index[axis] < dims[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}

impl<'a> TensorView<'a> {
    /// Create a view, validating that it stays inside `storage`.
    pub fn new(
        storage: &'a CpuStorage,
        offset: usize,
        shape: Shape,
        strides: Vec<usize>,
    ) -> Result<Self> {
        check_bounds(storage.len(), offset, &shape, &strides)?;
        Ok(TensorView {
            storage,
            offset,
            shape,
            strides,
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Size of dimension `i`.
    pub fn dim(&self, i: usize) -> usize {
        self.shape.dim(i)
    }

    /// Element stride of dimension `i`.
    pub fn stride(&self, i: usize) -> usize {
        self.strides[i]
    }

    /// Element offset of the first addressed element in the storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    pub fn is_contiguous(&self) -> bool {
        self.shape.is_contiguous(&self.strides)
    }

    /// Returns the storage this view aliases.
    pub fn storage(&self) -> &'a CpuStorage {
        self.storage
    }

    /// Reads the element at a multi-dimensional index, widened to f32.
    pub fn get(&self, index: &[usize]) -> Result<f32> {
        if index.len() != self.shape.ndim() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: index.to_vec(),
            });
        }
        let mut at = self.offset;
        for (axis, (&i, &s)) in index.iter().zip(&self.strides).enumerate() {
            if i >= self.shape.dim(axis) {
                return Err(TensorError::InvalidAxis {
                    axis,
                    ndim: self.shape.ndim(),
                });
            }
            at += i * s;
        }
        self.storage
            .get_f32(at)
            .ok_or(TensorError::OutOfBounds {
                end: at,
                len: self.storage.len(),
            })
    }

    /// Gathers the viewed elements into a contiguous f32 vector.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        element_offsets(self.offset, self.shape.dims(), &self.strides)
            .into_iter()
            .filter_map(|at| self.storage.get_f32(at))
            .collect()
    }
}

impl<'a> TensorViewMut<'a> {
    /// Create a mutable view, validating that it stays inside `storage`.
    pub fn new(
        storage: &'a mut CpuStorage,
        offset: usize,
        shape: Shape,
        strides: Vec<usize>,
    ) -> Result<Self> {
        check_bounds(storage.len(), offset, &shape, &strides)?;
        Ok(TensorViewMut {
            storage,
            offset,
            shape,
            strides,
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Writes `data` (row-major) into the viewed elements, converting to the
    /// storage dtype.
    pub fn write_f32(&mut self, data: &[f32]) -> Result<()> {
        if data.len() != self.shape.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.dims().to_vec(),
                got: vec![data.len()],
            });
        }
        if self.shape.is_contiguous(&self.strides) {
            if let CpuStorage::F32(buf) = &mut *self.storage {
                buf[self.offset..self.offset + data.len()].copy_from_slice(data);
                return Ok(());
            }
        }
        let offsets = element_offsets(self.offset, self.shape.dims(), &self.strides);
        for (at, &x) in offsets.into_iter().zip(data) {
            self.storage.set_f32(at, x)?;
        }
        Ok(())
    }

    /// Reborrow as a read-only view.
    pub fn as_view(&self) -> TensorView<'_> {
        TensorView {
            storage: self.storage,
            offset: self.offset,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }
}
