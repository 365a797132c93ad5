//! Durable bookkeeping for the scanner: cursor, block headers and unscanned records.
//!
//! On restart the scanner resumes from the stored cursor rather than from the
//! chain head. Headers are kept per height so a fork can be rewound without a
//! round-trip to the node, and unscanned records are the reconciliation
//! surface for transactions that failed extraction or delivery.

use async_trait::async_trait;

use crate::cursor::ScanCursor;
use crate::error::ScanError;
use crate::types::{BlockHeader, UnscanRecord};

/// Trait for storing and loading scanner state.
///
/// Implementations include `MemoryScanStore` and `SqliteScanStore` in
/// `chainscan-storage`. The scanner is the only writer.
#[async_trait]
pub trait ScanCursorStore: Send + Sync {
    /// Load the cursor (`None` on a fresh store).
    async fn get_cursor(&self) -> Result<Option<ScanCursor>, ScanError>;

    /// Save (upsert) the cursor.
    async fn save_cursor(&self, height: u64, hash: &str) -> Result<(), ScanError>;

    /// Save (upsert) the header stored for `header.height`.
    async fn save_block_header(&self, header: &BlockHeader) -> Result<(), ScanError>;

    /// Load the header stored for `height`.
    async fn get_block_header(&self, height: u64) -> Result<Option<BlockHeader>, ScanError>;

    /// Delete every header below `height`.
    async fn prune_block_headers_below(&self, height: u64) -> Result<(), ScanError>;

    /// Save (upsert by id) an unscanned record.
    async fn save_unscan_record(&self, record: &UnscanRecord) -> Result<(), ScanError>;

    /// Delete every unscanned record at `height`.
    async fn delete_unscan_records_at_height(&self, height: u64) -> Result<(), ScanError>;

    /// List all unscanned records, lowest height first.
    async fn list_unscan_records(&self) -> Result<Vec<UnscanRecord>, ScanError>;
}
