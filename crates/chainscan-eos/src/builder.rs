//! Fluent builder API for EOSIO scanners.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainscan_eos::{ChainReader, ScannerBuilder};
//! use chainscan_storage::MemoryScanStore;
//!
//! # fn example(node: Arc<dyn ChainReader>) -> Result<(), chainscan_core::ScanError> {
//! let scanner = ScannerBuilder::new()
//!     .chain("eos")
//!     .max_extracting(16)
//!     .chain_reader(node)
//!     .store(Arc::new(MemoryScanStore::new()))
//!     .resolver(|alias: &str| (alias == "alice").then(|| "K1".to_string()))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chainscan_core::config::ScannerConfig;
use chainscan_core::error::ScanError;
use chainscan_core::observer::{ObserverRegistry, ScanObserver};
use chainscan_core::resolver::{AccountResolver, IdentityResolver};
use chainscan_core::store::ScanCursorStore;

use crate::cache::{AbiCache, MemoryAbiCache};
use crate::chain::ChainReader;
use crate::decoder::ActionDecoder;
use crate::pipeline::{ExtractionPipeline, TxExtractor};
use crate::scan_loop::EosBlockScanner;

/// Fluent builder for [`EosBlockScanner`].
#[derive(Default)]
pub struct ScannerBuilder {
    config: ScannerConfig,
    chain: Option<Arc<dyn ChainReader>>,
    store: Option<Arc<dyn ScanCursorStore>>,
    cache: Option<Arc<dyn AbiCache>>,
    resolver: Option<Arc<dyn AccountResolver>>,
    observers: ObserverRegistry,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the chain slug used in logs.
    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.config.chain = chain.into();
        self
    }

    /// Set the ceiling on concurrently extracted transactions.
    pub fn max_extracting(mut self, n: usize) -> Self {
        self.config.max_extracting = n;
        self
    }

    /// Set the action name treated as a token transfer.
    pub fn transfer_action(mut self, name: impl Into<String>) -> Self {
        self.config.transfer_action = name.into();
        self
    }

    /// Keep this many stored headers below the cursor (`0` keeps all).
    pub fn header_retention(mut self, heights: u64) -> Self {
        self.config.header_retention = heights;
        self
    }

    pub fn scan_mempool(mut self, enabled: bool) -> Self {
        self.config.scan_mempool = enabled;
        self
    }

    pub fn chain_reader(mut self, chain: Arc<dyn ChainReader>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn store(mut self, store: Arc<dyn ScanCursorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share an ABI cache with other components. Defaults to a private
    /// [`MemoryAbiCache`].
    pub fn abi_cache(mut self, cache: Arc<dyn AbiCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Map chain accounts to tracking keys. Without a resolver every account
    /// is tracked under its own name.
    pub fn resolver(mut self, resolver: impl AccountResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    /// Build the `ScannerConfig`.
    pub fn build_config(self) -> ScannerConfig {
        self.config
    }

    /// Validate the configuration and assemble the scanner.
    pub fn build(self) -> Result<EosBlockScanner, ScanError> {
        self.config.validate()?;
        let chain = self
            .chain
            .ok_or_else(|| ScanError::Config("a chain reader is required".into()))?;
        let store = self
            .store
            .ok_or_else(|| ScanError::Config("a cursor store is required".into()))?;
        let cache: Arc<dyn AbiCache> = match self.cache {
            Some(cache) => cache,
            None => Arc::new(MemoryAbiCache::new()),
        };
        let resolver: Arc<dyn AccountResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(IdentityResolver),
        };

        let decoder = Arc::new(ActionDecoder::new(
            Arc::clone(&chain),
            cache,
            self.config.abi_cache_prefix.clone(),
        ));
        let extractor = Arc::new(TxExtractor::new(
            Arc::clone(&decoder),
            resolver,
            self.config.transfer_action.clone(),
            self.config.executed_status.clone(),
        ));
        let pipeline = ExtractionPipeline::new(
            extractor,
            Arc::clone(&store),
            self.observers.clone(),
            self.config.max_extracting,
        );

        Ok(EosBlockScanner::new(
            self.config,
            chain,
            store,
            decoder,
            pipeline,
            self.observers,
        ))
    }
}
