//! Fork detection and rewind planning.
//!
//! A fork is detected when the block fetched at `cursor + 1` does not name the
//! cursor's hash as its parent. The scanner then drops the block below the
//! target, discards its unscanned records and rewinds two heights; the next
//! poll re-validates ancestry from there.

use chainscan_core::cursor::ScanCursor;

use crate::chain::Block;

/// How far below the mismatching block the cursor rewinds.
pub const REWIND_DEPTH: u64 = 2;

/// Rewind decided after a parent-hash mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkRewind {
    /// Height of the block whose parent did not match.
    pub detected_at: u64,
    /// Height whose previously scanned header is reported as forked.
    pub forked_height: u64,
    /// New cursor height. Never below 1.
    pub rewind_height: u64,
}

impl ForkRewind {
    pub fn plan(detected_at: u64) -> Self {
        Self {
            detected_at,
            forked_height: detected_at.saturating_sub(1),
            rewind_height: detected_at.saturating_sub(REWIND_DEPTH).max(1),
        }
    }
}

/// Returns `true` if `block` does not extend the cursor.
pub fn is_fork(block: &Block, cursor: &ScanCursor) -> bool {
    block.previous != cursor.hash
}
