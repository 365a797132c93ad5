//! Capability traits a chain adapter can provide.
//!
//! A chain adapter composes whichever of these it supports; there is no base
//! type to inherit from.

use async_trait::async_trait;

use crate::error::ScanError;
use crate::types::BlockHeader;

/// Control surface of a block scanner.
#[async_trait]
pub trait BlockScanner: Send + Sync {
    /// Allow `scan_once` to make progress.
    fn start(&self);

    /// Ask a running scan to stop before the next height.
    fn stop(&self);

    /// Run one poll cycle: scan forward until caught up or stopped.
    async fn scan_once(&self) -> Result<(), ScanError>;

    /// Reset the cursor so the next poll rescans from `height`.
    async fn rescan_from(&self, height: u64) -> Result<(), ScanError>;

    /// Height of the last fully scanned block (0 before the first scan).
    async fn scanned_height(&self) -> Result<u64, ScanError>;

    /// Header of the current chain head.
    async fn current_block_header(&self) -> Result<BlockHeader, ScanError>;
}

/// Access to contract interface descriptions.
#[async_trait]
pub trait ContractDecoder: Send + Sync {
    type Abi: Send + Sync;

    /// Interface description of the contract deployed at `account`.
    async fn abi_info(&self, account: &str) -> Result<Self::Abi, ScanError>;
}
