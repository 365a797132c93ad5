//! Bounded per-transaction extraction.
//!
//! Every transaction of a block is extracted on its own spawned task, with at
//! most `max_extracting` tasks in flight. Results flow back to a single
//! aggregator (the caller's task) in completion order; the aggregator notifies
//! observers and writes unscanned records. `extract` returns only after every
//! transaction of the block has been accounted for.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, warn};

use chainscan_core::error::ScanError;
use chainscan_core::observer::ObserverRegistry;
use chainscan_core::resolver::AccountResolver;
use chainscan_core::store::ScanCursorStore;
use chainscan_core::types::{ExtractedTx, ExtractionResult, TxDirection, UnscanRecord};

use crate::chain::{Action, TransactionReceipt};
use crate::decoder::{ActionDecoder, Transfer};

/// Block fields stamped onto every extracted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    pub height: u64,
    pub hash: String,
    /// Unix seconds.
    pub time: i64,
}

/// Outcome of extracting one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Transactions in the block.
    pub total: usize,
    /// Transactions whose extraction failed.
    pub failed: usize,
    /// Extracted records delivered to observers.
    pub records: usize,
    /// Transactions with at least one rejected notification.
    pub notify_failures: usize,
}

// ─── Worker ───────────────────────────────────────────────────────────────────

/// Per-transaction extraction logic, shared by all workers.
pub struct TxExtractor {
    decoder: Arc<ActionDecoder>,
    resolver: Arc<dyn AccountResolver>,
    transfer_action: String,
    executed_status: String,
}

impl TxExtractor {
    pub fn new(
        decoder: Arc<ActionDecoder>,
        resolver: Arc<dyn AccountResolver>,
        transfer_action: impl Into<String>,
        executed_status: impl Into<String>,
    ) -> Self {
        Self {
            decoder,
            resolver,
            transfer_action: transfer_action.into(),
            executed_status: executed_status.into(),
        }
    }

    /// Extract the transfers of one transaction.
    ///
    /// Non-executed and id-only receipts succeed with no records. Any decode
    /// failure fails the whole transaction.
    pub async fn extract(
        &self,
        block: &BlockContext,
        receipt: &TransactionReceipt,
    ) -> Result<ExtractionResult, ScanError> {
        let mut result = ExtractionResult {
            tx_id: receipt.tx_id().to_string(),
            block_hash: block.hash.clone(),
            block_height: block.height,
            block_time: block.time,
            success: false,
            per_account: Default::default(),
        };

        if receipt.status != self.executed_status || !receipt.has_payload() {
            result.success = true;
            return Ok(result);
        }

        let actions = receipt.actions()?;
        for action in actions.iter().filter(|a| a.name == self.transfer_action) {
            let transfer = self.decoder.decode_transfer(action).await?;
            self.apply_transfer(&mut result, action, &transfer);
        }

        result.success = true;
        Ok(result)
    }

    fn apply_transfer(&self, result: &mut ExtractionResult, action: &Action, transfer: &Transfer) {
        let record = |direction| ExtractedTx {
            tx_id: result.tx_id.clone(),
            from: transfer.from.clone(),
            to: transfer.to.clone(),
            amount: transfer.quantity.amount_string(),
            symbol: transfer.quantity.symbol.code.clone(),
            decimals: transfer.quantity.decimals(),
            contract_address: action.account.clone(),
            memo: transfer.memo.clone(),
            block_height: result.block_height,
            block_hash: result.block_hash.clone(),
            confirm_time: result.block_time,
            direction,
        };

        let from_key = self.resolver.resolve(&transfer.from);
        let to_key = self.resolver.resolve(&transfer.to);
        let mut pending = Vec::with_capacity(2);
        match (from_key, to_key) {
            (Some(from), Some(to)) if from == to => pending.push((from, record(TxDirection::Both))),
            (from, to) => {
                if let Some(key) = from {
                    pending.push((key, record(TxDirection::Input)));
                }
                if let Some(key) = to {
                    pending.push((key, record(TxDirection::Output)));
                }
            }
        }
        for (key, tx) in pending {
            result.push(key, tx);
        }
    }
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────

/// Fans a block's transactions out to workers and aggregates the results.
pub struct ExtractionPipeline {
    extractor: Arc<TxExtractor>,
    store: Arc<dyn ScanCursorStore>,
    observers: ObserverRegistry,
    max_extracting: usize,
}

impl ExtractionPipeline {
    pub fn new(
        extractor: Arc<TxExtractor>,
        store: Arc<dyn ScanCursorStore>,
        observers: ObserverRegistry,
        max_extracting: usize,
    ) -> Self {
        Self {
            extractor,
            store,
            observers,
            max_extracting: max_extracting.max(1),
        }
    }

    /// Extract every transaction in `txs` and deliver the results.
    ///
    /// Returns [`ScanError::PartialExtraction`] if any transaction failed;
    /// each failure has already been recorded as an unscanned record.
    pub async fn extract(
        &self,
        block: &BlockContext,
        txs: &[TransactionReceipt],
    ) -> Result<ExtractionSummary, ScanError> {
        let mut summary = ExtractionSummary {
            total: txs.len(),
            ..Default::default()
        };
        if txs.is_empty() {
            return Ok(summary);
        }

        let mut results = stream::iter(txs.iter().cloned())
            .map(|receipt| {
                let extractor = Arc::clone(&self.extractor);
                let ctx = block.clone();
                let tx_id = receipt.tx_id().to_string();
                async move {
                    let handle = tokio::spawn(async move { extractor.extract(&ctx, &receipt).await });
                    (tx_id, handle.await)
                }
            })
            .buffer_unordered(self.max_extracting);

        let mut completed = 0usize;
        while let Some((tx_id, joined)) = results.next().await {
            completed += 1;
            let outcome = joined.unwrap_or_else(|e| Err(ScanError::Other(format!("extraction task failed: {e}"))));
            match outcome {
                Ok(result) => {
                    summary.records += result.record_count();
                    if !self.deliver(&result).await {
                        summary.notify_failures += 1;
                        self.record_unscanned(UnscanRecord::notify_failed(block.height, &tx_id))
                            .await;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        height = block.height,
                        tx_id = %tx_id,
                        error = %e,
                        "Transaction extraction failed"
                    );
                    self.record_unscanned(UnscanRecord::new(block.height, Some(tx_id), e.to_string()))
                        .await;
                }
            }
        }

        debug!(
            height = block.height,
            completed,
            total = summary.total,
            failed = summary.failed,
            records = summary.records,
            "Block extraction complete"
        );

        if summary.failed > 0 {
            return Err(ScanError::PartialExtraction {
                height: block.height,
                failed: summary.failed,
                total: summary.total,
            });
        }
        Ok(summary)
    }

    /// Notify observers of every record; `false` if any notification failed.
    async fn deliver(&self, result: &ExtractionResult) -> bool {
        let mut ok = true;
        for (key, records) in &result.per_account {
            for tx in records {
                if !self.observers.notify_extracted(key, tx).await.is_empty() {
                    ok = false;
                }
            }
        }
        ok
    }

    async fn record_unscanned(&self, record: UnscanRecord) {
        if let Err(e) = self.store.save_unscan_record(&record).await {
            error!(
                height = record.height,
                tx_id = ?record.tx_id,
                error = %e,
                "Failed to save unscan record"
            );
        }
    }
}
