//! `ir-cache` - Key/value attention cache for incremental inference.
//!
//! During token-by-token generation each transformer layer needs the keys and
//! values of every previously processed token. This crate keeps them in
//! per-layer, fixed-capacity stores shared by all sequences of a batch, and
//! hands back aliased views of the valid history together with a causal,
//! sequence-isolating attention mask.

pub mod cache;
pub mod config;
pub mod error;
pub mod layer_store;
pub mod mask;
pub mod occupancy;
pub mod simple;

pub use cache::{Cache, CacheViews, Options};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use layer_store::{LayerStore, StoreKind};
pub use occupancy::{Occupancy, SeqId, Slot};
pub use simple::SimpleCache;
