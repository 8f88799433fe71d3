use ir_tensor::DType;

use crate::error::{CacheError, Result};

/// Slot capacity used by [`CacheConfig::default`].
pub const DEFAULT_CAPACITY: usize = 2048;

/// Construction parameters for a KV cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Element type of the per-layer key/value stores.
    pub dtype: DType,
    /// Maximum number of slots (tokens across all sequences) the cache holds.
    pub capacity: usize,
}

impl CacheConfig {
    /// F32 storage with the given slot capacity.
    pub fn new(capacity: usize) -> Self {
        CacheConfig {
            dtype: DType::F32,
            capacity,
        }
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    /// Rejects configurations that could never accept a token.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::new(DEFAULT_CAPACITY)
    }
}
