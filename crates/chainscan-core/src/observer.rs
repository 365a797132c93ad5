//! Scan observer trait + registry.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ScanError;
use crate::types::{BlockHeader, ExtractedTx};

/// Trait for subscribers of scan results.
///
/// Implement this to receive new (or forked) block headers and the transfers
/// extracted for each tracking key.
#[async_trait]
pub trait ScanObserver: Send + Sync {
    /// Called for every newly scanned header, and for headers dropped by a
    /// reorg (with `is_fork` set).
    async fn on_new_header(&self, header: &BlockHeader);

    /// Called once per tracking key per extracted transfer.
    ///
    /// Returning an error records an unscanned entry for the block height; it
    /// never stalls the scan.
    async fn on_extracted_data(&self, key: &str, tx: &ExtractedTx) -> Result<(), ScanError>;

    /// Name used in logs and notify errors.
    fn name(&self) -> &str {
        "observer"
    }
}

/// Ordered set of observers.
///
/// Every call fans out to all observers in registration order before returning.
#[derive(Default, Clone)]
pub struct ObserverRegistry {
    observers: Vec<Arc<dyn ScanObserver>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn add(&mut self, observer: Arc<dyn ScanObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver a header to all observers.
    pub async fn notify_header(&self, header: &BlockHeader) {
        for observer in &self.observers {
            observer.on_new_header(header).await;
        }
    }

    /// Deliver one extracted transfer to all observers.
    ///
    /// Every observer is invoked even if an earlier one fails; the returned
    /// vector holds one error per rejecting observer.
    pub async fn notify_extracted(&self, key: &str, tx: &ExtractedTx) -> Vec<ScanError> {
        let mut failures = Vec::new();
        for observer in &self.observers {
            if let Err(e) = observer.on_extracted_data(key, tx).await {
                tracing::warn!(
                    observer = observer.name(),
                    key,
                    tx_id = %tx.tx_id,
                    error = %e,
                    "Observer rejected extracted data"
                );
                failures.push(match e {
                    ScanError::Notify { .. } => e,
                    other => ScanError::Notify {
                        observer: observer.name().to_string(),
                        reason: other.to_string(),
                    },
                });
            }
        }
        failures
    }
}
