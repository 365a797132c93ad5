//! In-memory storage backend.
//!
//! Stores the cursor, block headers and unscanned records in RAM.
//! Useful for testing and short-lived scanners that don't need persistence.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chainscan_core::cursor::ScanCursor;
use chainscan_core::error::ScanError;
use chainscan_core::store::ScanCursorStore;
use chainscan_core::types::{BlockHeader, UnscanRecord};

/// In-memory scanner storage.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryScanStore {
    cursor: Mutex<Option<ScanCursor>>,
    headers: Mutex<BTreeMap<u64, BlockHeader>>,
    records: Mutex<HashMap<String, UnscanRecord>>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored headers.
    pub fn header_count(&self) -> usize {
        self.headers.lock().unwrap().len()
    }

    /// Unscanned records at a single height.
    pub fn records_at(&self, height: u64) -> Vec<UnscanRecord> {
        self.records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.height == height)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ScanCursorStore for MemoryScanStore {
    async fn get_cursor(&self) -> Result<Option<ScanCursor>, ScanError> {
        Ok(self.cursor.lock().unwrap().clone())
    }

    async fn save_cursor(&self, height: u64, hash: &str) -> Result<(), ScanError> {
        *self.cursor.lock().unwrap() = Some(ScanCursor::new(height, hash));
        Ok(())
    }

    async fn save_block_header(&self, header: &BlockHeader) -> Result<(), ScanError> {
        self.headers
            .lock()
            .unwrap()
            .insert(header.height, header.clone());
        Ok(())
    }

    async fn get_block_header(&self, height: u64) -> Result<Option<BlockHeader>, ScanError> {
        Ok(self.headers.lock().unwrap().get(&height).cloned())
    }

    async fn prune_block_headers_below(&self, height: u64) -> Result<(), ScanError> {
        let mut headers = self.headers.lock().unwrap();
        *headers = headers.split_off(&height);
        Ok(())
    }

    async fn save_unscan_record(&self, record: &UnscanRecord) -> Result<(), ScanError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete_unscan_records_at_height(&self, height: u64) -> Result<(), ScanError> {
        self.records.lock().unwrap().retain(|_, r| r.height != height);
        Ok(())
    }

    async fn list_unscan_records(&self) -> Result<Vec<UnscanRecord>, ScanError> {
        let mut records: Vec<_> = self.records.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| a.height.cmp(&b.height).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }
}
