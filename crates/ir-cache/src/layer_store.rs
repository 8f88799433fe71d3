use std::fmt;

use ir_tensor::{ComputeBackend, CpuStorage, DType, Shape, Tensor, TensorView};
use tracing::debug;

use crate::error::{CacheError, Result};

/// Which half of a layer's cache a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Key,
    Value,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Key => write!(f, "key"),
            StoreKind::Value => write!(f, "value"),
        }
    }
}

/// A fixed-capacity arena of per-token vectors.
///
/// Layout: `[capacity, ...slot_shape]` row-major, so slot `i` starts at
/// element `i * slot_width`.
#[derive(Debug)]
pub struct Store {
    storage: CpuStorage,
    slot_shape: Shape,
}

impl Store {
    /// Allocates a zeroed store of `capacity` slots of `slot_shape`.
    pub fn allocate(
        backend: &dyn ComputeBackend,
        dtype: DType,
        slot_shape: Shape,
        capacity: usize,
    ) -> Result<Self> {
        let storage = backend.zeros(dtype, slot_shape.numel() * capacity)?;
        Ok(Store {
            storage,
            slot_shape,
        })
    }

    /// Shape of one slot (the per-token dimensions).
    pub fn slot_shape(&self) -> &Shape {
        &self.slot_shape
    }

    /// Elements per slot.
    pub fn slot_width(&self) -> usize {
        self.slot_shape.numel()
    }

    pub fn storage(&self) -> &CpuStorage {
        &self.storage
    }

    fn check(&self, layer: usize, kind: StoreKind, src: &Tensor) -> Result<()> {
        let got = src.shape().inner();
        if got != self.slot_shape {
            return Err(CacheError::LayerShapeMismatch {
                layer,
                kind,
                expected: self.slot_shape.dims().to_vec(),
                got: got.dims().to_vec(),
            });
        }
        Ok(())
    }

    /// Copies `src` (`[batch, ...slot_shape]`) into slots `[pos, pos + batch)`.
    fn write(&mut self, backend: &dyn ComputeBackend, src: &Tensor, pos: usize) -> Result<()> {
        let offset = self.slot_width() * pos;
        let dst = self
            .storage
            .view_mut(offset, src.shape().clone(), src.strides())?;
        backend.copy(src, dst)?;
        Ok(())
    }

    /// View over slots `[0, n)` with shape `[n, ...slot_shape]`.
    pub fn history(&self, n: usize) -> Result<TensorView<'_>> {
        let mut dims = Vec::with_capacity(self.slot_shape.ndim() + 1);
        dims.push(n);
        dims.extend_from_slice(self.slot_shape.dims());
        let shape = Shape::new(dims);
        let strides = shape.strides();
        Ok(self.storage.view(0, shape, strides)?)
    }
}

/// Key and value stores of one layer, allocated together.
#[derive(Debug)]
struct KvStores {
    keys: Store,
    values: Store,
}

/// Per-layer cache storage. Empty until the layer receives its first `put`,
/// since the vector widths are only known from the tensors themselves.
#[derive(Debug, Default)]
pub struct LayerStore {
    stores: Option<KvStores>,
}

/// Where and how a `put` lands in a layer store.
#[derive(Debug, Clone, Copy)]
pub struct PutTarget<'a> {
    pub backend: &'a dyn ComputeBackend,
    pub dtype: DType,
    pub capacity: usize,
    pub layer: usize,
    /// First slot written by this batch.
    pub pos: usize,
}

impl LayerStore {
    pub fn is_allocated(&self) -> bool {
        self.stores.is_some()
    }

    pub fn keys(&self) -> Option<&Store> {
        self.stores.as_ref().map(|s| &s.keys)
    }

    pub fn values(&self) -> Option<&Store> {
        self.stores.as_ref().map(|s| &s.values)
    }

    /// Writes the batch's keys and values at `target.pos` and returns views
    /// over every valid slot `[0, pos + batch)` of both stores.
    ///
    /// Both tensors must be `[batch, ...]` with a batch size already checked
    /// by the caller. The per-token shape of each store is fixed by the first
    /// call; later calls with a different shape fail before anything is written.
    pub fn put(
        &mut self,
        target: PutTarget<'_>,
        key: &Tensor,
        value: &Tensor,
    ) -> Result<(TensorView<'_>, TensorView<'_>)> {
        let batch = key.shape().checked_dim(0)?;
        value.shape().checked_dim(0)?;

        let stores = match self.stores.take() {
            Some(stores) => stores,
            None => {
                let keys = Store::allocate(
                    target.backend,
                    target.dtype,
                    key.shape().inner(),
                    target.capacity,
                )?;
                let values = Store::allocate(
                    target.backend,
                    target.dtype,
                    value.shape().inner(),
                    target.capacity,
                )?;
                debug!(
                    layer = target.layer,
                    key_width = keys.slot_width(),
                    value_width = values.slot_width(),
                    dtype = %target.dtype,
                    capacity = target.capacity,
                    bytes = keys.storage.size_in_bytes() + values.storage.size_in_bytes(),
                    "allocated layer store"
                );
                KvStores { keys, values }
            }
        };
        let stores = self.stores.insert(stores);

        stores.keys.check(target.layer, StoreKind::Key, key)?;
        stores.values.check(target.layer, StoreKind::Value, value)?;

        stores.keys.write(target.backend, key, target.pos)?;
        stores.values.write(target.backend, value, target.pos)?;

        let n = target.pos + batch;
        let stores: &KvStores = stores;
        Ok((stores.keys.history(n)?, stores.values.history(n)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir_tensor::CpuBackend;

    fn target(backend: &CpuBackend, pos: usize) -> PutTarget<'_> {
        PutTarget {
            backend,
            dtype: DType::F32,
            capacity: 4,
            layer: 0,
            pos,
        }
    }

    #[test]
    fn test_lazy_allocation() {
        let backend = CpuBackend::new();
        let mut layer = LayerStore::default();
        assert!(!layer.is_allocated());

        let k = Tensor::new(vec![1.0, 2.0], Shape::new(vec![1, 2]));
        let v = Tensor::new(vec![3.0, 4.0, 5.0], Shape::new(vec![1, 3]));
        layer.put(target(&backend, 0), &k, &v).unwrap();

        assert!(layer.is_allocated());
        let keys = layer.keys().unwrap();
        let values = layer.values().unwrap();
        assert_eq!(keys.slot_width(), 2);
        assert_eq!(values.slot_width(), 3);
        assert_eq!(keys.storage().len(), 8);
        assert_eq!(values.storage().len(), 12);
    }

    #[test]
    fn test_put_writes_at_pos_and_returns_history() {
        let backend = CpuBackend::new();
        let mut layer = LayerStore::default();
        let k0 = Tensor::new(vec![1.0, 2.0], Shape::new(vec![1, 2]));
        layer.put(target(&backend, 0), &k0, &k0).unwrap();

        let k1 = Tensor::new(vec![3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 2]));
        let (k, v) = layer.put(target(&backend, 1), &k1, &k1).unwrap();
        assert_eq!(k.shape().dims(), &[3, 2]);
        assert_eq!(k.strides(), &[2, 1]);
        assert_eq!(k.offset(), 0);
        assert_eq!(k.to_f32_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(v.to_f32_vec(), k.to_f32_vec());
    }

    #[test]
    fn test_shape_fixed_after_allocation() {
        let backend = CpuBackend::new();
        let mut layer = LayerStore::default();
        let k = Tensor::new(vec![1.0, 2.0], Shape::new(vec![1, 2]));
        layer.put(target(&backend, 0), &k, &k).unwrap();

        let wide = Tensor::new(vec![1.0, 2.0, 3.0], Shape::new(vec![1, 3]));
        let err = layer.put(target(&backend, 1), &k, &wide).unwrap_err();
        match err {
            CacheError::LayerShapeMismatch {
                layer,
                kind,
                expected,
                got,
            } => {
                assert_eq!(layer, 0);
                assert_eq!(kind, StoreKind::Value);
                assert_eq!(expected, vec![2]);
                assert_eq!(got, vec![3]);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing was written for the rejected batch.
        let keys = layer.keys().unwrap();
        assert_eq!(keys.history(2).unwrap().to_f32_vec(), vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_same_width_different_split_rejected() {
        let backend = CpuBackend::new();
        let mut layer = LayerStore::default();
        let k = Tensor::zeros(Shape::new(vec![1, 2, 4]));
        layer.put(target(&backend, 0), &k, &k).unwrap();
        let regrouped = Tensor::zeros(Shape::new(vec![1, 4, 2]));
        assert!(matches!(
            layer.put(target(&backend, 1), &regrouped, &regrouped),
            Err(CacheError::LayerShapeMismatch { kind: StoreKind::Key, .. })
        ));
    }

    #[test]
    fn test_store_kind_display() {
        assert_eq!(StoreKind::Key.to_string(), "key");
        assert_eq!(StoreKind::Value.to_string(), "value");
    }
}
