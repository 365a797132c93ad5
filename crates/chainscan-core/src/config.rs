//! Scanner configuration and state types.

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Default ceiling on concurrently extracted transactions per block.
pub const DEFAULT_MAX_EXTRACTING: usize = 10;

/// Default number of block headers kept below the cursor.
pub const DEFAULT_HEADER_RETENTION: u64 = 1000;

/// Configuration for a scanner instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Chain slug, used in logs (e.g. `"eos"`).
    pub chain: String,
    /// Maximum number of transactions extracted in parallel within one block.
    pub max_extracting: usize,
    /// Action name decoded as a token transfer.
    pub transfer_action: String,
    /// Receipt status of transactions that are worth decoding.
    pub executed_status: String,
    /// Whether the host also scans the mempool. Informational only.
    pub scan_mempool: bool,
    /// Prefix of ABI cache keys (`"ABI_" + account`).
    pub abi_cache_prefix: String,
    /// Stored headers older than this many heights below the cursor are
    /// pruned. `0` keeps every header.
    pub header_retention: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            chain: "eos".into(),
            max_extracting: DEFAULT_MAX_EXTRACTING,
            transfer_action: "transfer".into(),
            executed_status: "executed".into(),
            scan_mempool: true,
            abi_cache_prefix: "ABI_".into(),
            header_retention: DEFAULT_HEADER_RETENTION,
        }
    }
}

impl ScannerConfig {
    /// Check that the configuration can drive a scanner.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.max_extracting == 0 {
            return Err(ScanError::Config("max_extracting must be at least 1".into()));
        }
        if self.transfer_action.is_empty() {
            return Err(ScanError::Config("transfer_action must not be empty".into()));
        }
        Ok(())
    }
}

/// Runtime state of the scan loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    /// Caught up (or not yet polled).
    Idle,
    /// Behind the chain head, about to fetch the next height.
    CatchingUp,
    /// Extracting and persisting one block.
    ScanningHeight,
    /// Rewinding after a parent-hash mismatch.
    ForkDetected,
    /// `stop()` was called.
    Stopped,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CatchingUp => write!(f, "catching-up"),
            Self::ScanningHeight => write!(f, "scanning-height"),
            Self::ForkDetected => write!(f, "fork-detected"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
