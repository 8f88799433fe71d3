use std::fmt::Debug;

use ir_tensor::{Tensor, TensorView};

use crate::error::Result;
use crate::occupancy::SeqId;

/// Per-call options for [`Cache::put`].
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Reserved for per-call tuning and ignored by every cache in this
    /// crate. The batch's sequences are taken from [`Cache::start_forward`].
    pub sequences: Vec<SeqId>,
}

/// What a layer gets back from [`Cache::put`]: the full valid key/value
/// history of that layer and the attention mask of the current pass.
///
/// The views alias the cache's layer store and are only meaningful until the
/// next forward pass writes to the same slots.
#[derive(Debug, Clone)]
pub struct CacheViews<'a> {
    /// Keys of slots `[0, pos + batch)`, shape `[pos + batch, ...]`.
    pub key: TensorView<'a>,
    /// Values of slots `[0, pos + batch)`, shape `[pos + batch, ...]`.
    pub value: TensorView<'a>,
    /// Additive mask, shape `[batch, pos + batch]`.
    pub mask: &'a Tensor,
}

impl<'a> CacheViews<'a> {
    pub fn into_parts(self) -> (TensorView<'a>, TensorView<'a>, &'a Tensor) {
        (self.key, self.value, self.mask)
    }
}

/// Trait for KV cache strategies used by a model's attention layers.
///
/// A forward pass calls [`start_forward`](Cache::start_forward) once, then
/// [`sub`](Cache::sub) and [`put`](Cache::put) once per layer. Entries may be
/// invalidated with [`remove`](Cache::remove) between passes.
pub trait Cache: Send + Debug {
    /// Begins a forward pass for a batch of tokens, one sequence id per token.
    fn start_forward(&mut self, seqs: &[SeqId]) -> Result<()>;

    /// Selects the layer that subsequent `put` calls target.
    fn sub(&mut self, layer: usize) -> &mut dyn Cache;

    /// Stores the current batch's keys and values (`[batch, ...]`) for the
    /// selected layer and returns the layer's full history plus the mask.
    fn put(&mut self, key: &Tensor, value: &Tensor, opts: &Options) -> Result<CacheViews<'_>>;

    /// Invalidates the slots in `[begin, end)` that belong to `seq`.
    fn remove(&mut self, seq: SeqId, begin: usize, end: usize);

    /// Releases all storage. Every later operation fails with `Closed`.
    fn close(&mut self);
}
