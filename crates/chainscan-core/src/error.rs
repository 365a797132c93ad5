//! Error types for the chainscan pipeline.

use thiserror::Error;

/// Errors that can occur while scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Chain head, block, account or ABI fetch failed. Retried on the next poll.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Cursor, header or unscanned-record store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Action payload or transaction could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Observer '{observer}' rejected extracted data: {reason}")]
    Notify { observer: String, reason: String },

    #[error("Extraction at block {height} failed for {failed} of {total} transactions")]
    PartialExtraction { height: u64, failed: usize, total: usize },

    #[error("Invalid block height {height}: {reason}")]
    InvalidHeight { height: u64, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl ScanError {
    /// Returns `true` for failures that only abort the current poll cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// Returns `true` if the error came from the persistence layer.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
