//! ABI cache.
//!
//! Shared by all extraction workers, so implementations must tolerate
//! concurrent lookups and inserts. Entries are keyed `"ABI_" + account` by
//! default and live for the lifetime of the process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::abi::Abi;

/// Process-wide ABI store.
///
/// An expiring implementation can be plugged in behind the same trait.
pub trait AbiCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<Abi>>;
    fn insert(&self, key: String, abi: Arc<Abi>);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe in-memory cache, no eviction.
#[derive(Clone, Default)]
pub struct MemoryAbiCache {
    inner: Arc<RwLock<HashMap<String, Arc<Abi>>>>,
}

impl MemoryAbiCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AbiCache for MemoryAbiCache {
    fn get(&self, key: &str) -> Option<Arc<Abi>> {
        self.inner.read().unwrap().get(key).cloned()
    }

    fn insert(&self, key: String, abi: Arc<Abi>) {
        self.inner.write().unwrap().insert(key, abi);
    }

    fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }
}
