use std::sync::Arc;

use ir_tensor::{ComputeBackend, DType, Tensor};
use tracing::{debug, trace};

use crate::cache::{Cache, CacheViews, Options};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::layer_store::{LayerStore, PutTarget};
use crate::mask;
use crate::occupancy::{Occupancy, SeqId};

/// A non-evicting KV cache with one linear slot space shared by every
/// sequence.
///
/// Slots are handed out in arrival order and never reused: removing entries
/// only hides them from later masks. Once `capacity - 1` slots are used, new
/// batches are rejected with [`CacheError::CapacityExceeded`].
#[derive(Debug)]
pub struct SimpleCache {
    config: CacheConfig,
    backend: Arc<dyn ComputeBackend>,

    cur_layer: usize,
    occupancy: Occupancy,
    /// First slot of the current batch.
    pos: usize,
    cur_batch_size: usize,
    mask: Option<Tensor>,

    layers: Vec<LayerStore>,
    closed: bool,
}

impl SimpleCache {
    /// Create an empty cache. Layer stores are allocated on first use.
    pub fn new(backend: Arc<dyn ComputeBackend>, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            backend = backend.name(),
            capacity = config.capacity,
            dtype = %config.dtype,
            "created kv cache"
        );
        Ok(SimpleCache {
            config,
            backend,
            cur_layer: 0,
            occupancy: Occupancy::new(),
            pos: 0,
            cur_batch_size: 0,
            mask: None,
            layers: Vec::new(),
            closed: false,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn dtype(&self) -> DType {
        self.config.dtype
    }

    /// Number of slots committed before the current batch.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Size of the batch started by the last `start_forward`.
    pub fn batch_size(&self) -> usize {
        self.cur_batch_size
    }

    /// Number of slots ever written, including removed ones.
    pub fn len(&self) -> usize {
        self.occupancy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy.is_empty()
    }

    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    /// Number of layers registered through `sub` or `put`.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn current_layer(&self) -> usize {
        self.cur_layer
    }

    /// Returns true once `layer` has received its first `put`.
    pub fn is_allocated(&self, layer: usize) -> bool {
        self.layers.get(layer).is_some_and(LayerStore::is_allocated)
    }

    pub fn layer(&self, layer: usize) -> Option<&LayerStore> {
        self.layers.get(layer)
    }

    /// Mask of the current forward pass, `[batch, pos + batch]`.
    pub fn mask(&self) -> Option<&Tensor> {
        self.mask.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(CacheError::Closed);
        }
        Ok(())
    }

    fn ensure_layer(layers: &mut Vec<LayerStore>, layer: usize) {
        if layer >= layers.len() {
            layers.resize_with(layer + 1, LayerStore::default);
        }
    }
}

impl Cache for SimpleCache {
    fn start_forward(&mut self, seqs: &[SeqId]) -> Result<()> {
        self.ensure_open()?;

        let pos = self.occupancy.len();
        let batch_size = seqs.len();
        if pos + batch_size >= self.config.capacity {
            debug!(
                capacity = self.config.capacity,
                pos, batch_size, "rejected batch: capacity exceeded"
            );
            // The previous pass is over; a stray put must not write at its pos.
            self.mask = None;
            self.cur_batch_size = 0;
            return Err(CacheError::CapacityExceeded {
                capacity: self.config.capacity,
                pos,
                batch_size,
            });
        }

        self.occupancy.append(seqs);
        self.pos = pos;
        self.cur_batch_size = batch_size;

        let data = mask::build_mask(pos, seqs, self.occupancy.slots());
        self.mask = Some(
            self.backend
                .from_f32_slice(&data, mask::mask_shape(pos, batch_size))?,
        );

        trace!(pos, batch_size, "started forward pass");
        Ok(())
    }

    fn sub(&mut self, layer: usize) -> &mut dyn Cache {
        if !self.closed {
            Self::ensure_layer(&mut self.layers, layer);
        }
        self.cur_layer = layer;
        self
    }

    fn put(&mut self, key: &Tensor, value: &Tensor, _opts: &Options) -> Result<CacheViews<'_>> {
        self.ensure_open()?;
        let layer = self.cur_layer;

        let Some(mask) = self.mask.as_ref() else {
            return Err(CacheError::NoForwardPass);
        };

        for t in [key, value] {
            let batch = t.shape().checked_dim(0)?;
            if batch != self.cur_batch_size {
                return Err(CacheError::BatchSizeMismatch {
                    layer,
                    expected: self.cur_batch_size,
                    got: batch,
                });
            }
        }

        Self::ensure_layer(&mut self.layers, layer);
        let target = PutTarget {
            backend: self.backend.as_ref(),
            dtype: self.config.dtype,
            capacity: self.config.capacity,
            layer,
            pos: self.pos,
        };
        let (key, value) = self.layers[layer].put(target, key, value)?;

        Ok(CacheViews { key, value, mask })
    }

    fn remove(&mut self, seq: SeqId, begin: usize, end: usize) {
        if self.closed {
            return;
        }
        let removed = self.occupancy.remove(seq, begin, end);
        debug!(seq, begin, end, removed, "removed cache entries");
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.layers = Vec::new();
        self.mask = None;
        self.occupancy.clear();
        self.pos = 0;
        self.cur_batch_size = 0;
        self.closed = true;
        debug!("closed kv cache");
    }
}
