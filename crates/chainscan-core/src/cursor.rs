//! Scan cursor — the last fully processed block.

use serde::{Deserialize, Serialize};

/// The scanner's current position in the chain.
///
/// Advanced only after a block has been extracted and persisted; read at
/// startup to resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    /// Last scanned block number.
    pub height: u64,
    /// Last scanned block id.
    pub hash: String,
}

impl ScanCursor {
    pub fn new(height: u64, hash: impl Into<String>) -> Self {
        Self {
            height,
            hash: hash.into(),
        }
    }

    /// Move the cursor to a newly scanned block.
    pub fn advance(&mut self, height: u64, hash: impl Into<String>) {
        self.height = height;
        self.hash = hash.into();
    }

    /// Returns the next block to scan (cursor + 1).
    pub fn next_height(&self) -> u64 {
        self.height + 1
    }

    /// Returns `true` once the cursor has reached `head`.
    pub fn is_caught_up(&self, head: u64) -> bool {
        self.height >= head
    }
}
