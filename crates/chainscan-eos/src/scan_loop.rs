//! The EOSIO scan loop: resume, catch up, detect forks, extract.
//!
//! # One poll cycle (`scan_once`)
//! 1. Load the cursor. With no cursor, adopt `head - 1` (cold start).
//! 2. While running and behind the head:
//!    - fetch `cursor + 1`
//!    - parent mismatch → rewind (see [`crate::fork`]) and continue
//!    - otherwise clear stale unscanned records, extract, persist cursor and
//!      header, notify observers, advance
//!
//! RPC failures end the cycle quietly; the host calls `scan_once` again on
//! its own schedule. Storage failures are returned.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use chainscan_core::config::{ScanState, ScannerConfig};
use chainscan_core::cursor::ScanCursor;
use chainscan_core::error::ScanError;
use chainscan_core::observer::ObserverRegistry;
use chainscan_core::scanner::BlockScanner;
use chainscan_core::store::ScanCursorStore;
use chainscan_core::types::BlockHeader;

use crate::chain::{Block, ChainReader};
use crate::decoder::ActionDecoder;
use crate::fork::{is_fork, ForkRewind};
use crate::pipeline::{BlockContext, ExtractionPipeline, ExtractionSummary};

/// EOSIO block scanner.
pub struct EosBlockScanner {
    config: ScannerConfig,
    chain: Arc<dyn ChainReader>,
    store: Arc<dyn ScanCursorStore>,
    decoder: Arc<ActionDecoder>,
    pipeline: ExtractionPipeline,
    observers: ObserverRegistry,
    running: AtomicBool,
    state: Mutex<ScanState>,
}

impl EosBlockScanner {
    /// Use [`ScannerBuilder`](crate::ScannerBuilder) to assemble one.
    pub(crate) fn new(
        config: ScannerConfig,
        chain: Arc<dyn ChainReader>,
        store: Arc<dyn ScanCursorStore>,
        decoder: Arc<ActionDecoder>,
        pipeline: ExtractionPipeline,
        observers: ObserverRegistry,
    ) -> Self {
        Self {
            config,
            chain,
            store,
            decoder,
            pipeline,
            observers,
            running: AtomicBool::new(false),
            state: Mutex::new(ScanState::Idle),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn decoder(&self) -> &ActionDecoder {
        &self.decoder
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: ScanState) {
        *self.state.lock().unwrap() = state;
    }

    /// Stored cursor, or the cold-start cursor at `head - 1` (persisted).
    pub async fn load_cursor(&self) -> Result<ScanCursor, ScanError> {
        if let Some(cursor) = self.store.get_cursor().await? {
            return Ok(cursor);
        }

        let head = self.chain.get_chain_head().await?;
        let start = head.saturating_sub(1).max(1);
        let block = self.chain.get_block_by_height(start).await?;
        self.store.save_cursor(block.block_num, &block.id).await?;

        info!(
            chain = %self.config.chain,
            head,
            height = block.block_num,
            hash = %block.id,
            "No saved cursor, starting near chain head"
        );
        Ok(ScanCursor::new(block.block_num, block.id))
    }

    async fn run_cycle(&self) -> Result<(), ScanError> {
        let mut cursor = match self.load_cursor().await {
            Ok(c) => c,
            Err(e) if e.is_transient() => {
                warn!(chain = %self.config.chain, error = %e, "Failed to load scan cursor");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        while self.is_running() {
            self.set_state(ScanState::CatchingUp);

            let head = match self.chain.get_chain_head().await {
                Ok(h) => h,
                Err(e) => {
                    warn!(chain = %self.config.chain, error = %e, "Failed to get chain head");
                    break;
                }
            };

            if cursor.is_caught_up(head) {
                debug!(chain = %self.config.chain, height = cursor.height, "Scanned to chain head");
                break;
            }

            let target = cursor.next_height();
            let block = match self.chain.get_block_by_height(target).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(chain = %self.config.chain, height = target, error = %e, "Failed to fetch block");
                    break;
                }
            };

            if is_fork(&block, &cursor) {
                self.set_state(ScanState::ForkDetected);
                match self.rewind(&block, &cursor).await {
                    Ok(rewound) => cursor = rewound,
                    Err(e) if e.is_transient() => {
                        warn!(chain = %self.config.chain, height = target, error = %e, "Fork rewind incomplete");
                        break;
                    }
                    Err(e) => return Err(e),
                }
                continue;
            }

            self.set_state(ScanState::ScanningHeight);
            if let Err(e) = self.scan_height(&block).await {
                if e.is_persistence() {
                    error!(chain = %self.config.chain, height = target, error = %e, "Failed to persist scanned block");
                }
                return Err(e);
            }
            cursor.advance(block.block_num, block.id);
        }

        Ok(())
    }

    /// Extract, persist and announce one block that extends the cursor.
    async fn scan_height(&self, block: &Block) -> Result<(), ScanError> {
        let header = block.header();
        info!(
            chain = %self.config.chain,
            height = header.height,
            hash = %header.hash,
            txs = header.tx_count,
            "Scanning block"
        );

        // records from an earlier attempt at this height are superseded
        self.store.delete_unscan_records_at_height(header.height).await?;
        self.extract_block(block).await;

        self.store.save_cursor(header.height, &header.hash).await?;
        self.store.save_block_header(&header).await?;
        let retention = self.config.header_retention;
        if retention > 0 && header.height > retention {
            self.store.prune_block_headers_below(header.height - retention).await?;
        }
        self.observers.notify_header(&header).await;
        Ok(())
    }

    /// Run the pipeline over a block. Failed transactions are already
    /// recorded by the pipeline, so they only get a warning here.
    async fn extract_block(&self, block: &Block) {
        let ctx = BlockContext {
            height: block.block_num,
            hash: block.id.clone(),
            time: block.unix_time(),
        };
        match self.pipeline.extract(&ctx, &block.transactions).await {
            Ok(summary) => debug!(
                chain = %self.config.chain,
                height = ctx.height,
                txs = summary.total,
                records = summary.records,
                notify_failures = summary.notify_failures,
                "Block extracted"
            ),
            Err(e) => {
                warn!(chain = %self.config.chain, height = ctx.height, error = %e, "Block extracted with failures")
            }
        }
    }

    async fn rewind(&self, block: &Block, cursor: &ScanCursor) -> Result<ScanCursor, ScanError> {
        let plan = ForkRewind::plan(block.block_num);
        warn!(
            chain = %self.config.chain,
            height = plan.detected_at,
            local_hash = %cursor.hash,
            chain_parent = %block.previous,
            rewind_to = plan.rewind_height,
            "Fork detected"
        );

        let forked = self.store.get_block_header(plan.forked_height).await?;
        self.store.delete_unscan_records_at_height(plan.forked_height).await?;

        let hash = self.hash_at(plan.rewind_height).await?;
        self.store.save_cursor(plan.rewind_height, &hash).await?;

        if let Some(header) = forked {
            self.observers.notify_header(&header.as_forked()).await;
        }
        Ok(ScanCursor::new(plan.rewind_height, hash))
    }

    /// Block id at `height`, preferring the locally scanned header.
    async fn hash_at(&self, height: u64) -> Result<String, ScanError> {
        if let Some(header) = self.store.get_block_header(height).await? {
            return Ok(header.hash);
        }
        Ok(self.chain.get_block_by_height(height).await?.id)
    }

    /// Extract a single block out of band. The cursor is left untouched.
    pub async fn scan_block(&self, height: u64) -> Result<ExtractionSummary, ScanError> {
        let block = self.chain.get_block_by_height(height).await?;
        self.store.delete_unscan_records_at_height(height).await?;
        let ctx = BlockContext {
            height: block.block_num,
            hash: block.id.clone(),
            time: block.unix_time(),
        };
        self.pipeline.extract(&ctx, &block.transactions).await
    }

    /// Re-extract every height that has unscanned records.
    ///
    /// Returns the number of heights that were re-extracted. Heights whose
    /// block cannot be fetched keep their records for the next attempt.
    pub async fn rescan_failed_records(&self) -> Result<usize, ScanError> {
        let heights: BTreeSet<u64> = self
            .store
            .list_unscan_records()
            .await?
            .into_iter()
            .map(|r| r.height)
            .collect();

        let mut rescanned = 0;
        for height in heights {
            let block = match self.chain.get_block_by_height(height).await {
                Ok(b) => b,
                Err(e) if e.is_transient() => {
                    warn!(chain = %self.config.chain, height, error = %e, "Rescan skipped");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.store.delete_unscan_records_at_height(height).await?;
            self.extract_block(&block).await;
            rescanned += 1;
        }

        info!(chain = %self.config.chain, rescanned, "Rescanned failed records");
        Ok(rescanned)
    }
}

#[async_trait]
impl BlockScanner for EosBlockScanner {
    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            chain = %self.config.chain,
            max_extracting = self.config.max_extracting,
            scan_mempool = self.config.scan_mempool,
            "Scanner started"
        );
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.set_state(ScanState::Stopped);
        info!(chain = %self.config.chain, "Scanner stopped");
    }

    async fn scan_once(&self) -> Result<(), ScanError> {
        if !self.is_running() {
            debug!(chain = %self.config.chain, "Scanner not running, poll skipped");
            return Ok(());
        }
        let result = self.run_cycle().await;
        self.set_state(if self.is_running() {
            ScanState::Idle
        } else {
            ScanState::Stopped
        });
        result
    }

    async fn rescan_from(&self, height: u64) -> Result<(), ScanError> {
        if height == 0 {
            return Err(ScanError::InvalidHeight {
                height,
                reason: "rescan height must be greater than 0".into(),
            });
        }
        let resume = height - 1;
        let hash = self.hash_at(resume).await?;
        self.store.save_cursor(resume, &hash).await?;
        info!(chain = %self.config.chain, height, "Rescan requested");
        Ok(())
    }

    async fn scanned_height(&self) -> Result<u64, ScanError> {
        Ok(self.store.get_cursor().await?.map_or(0, |c| c.height))
    }

    async fn current_block_header(&self) -> Result<BlockHeader, ScanError> {
        let head = self.chain.get_chain_head().await?;
        Ok(self.chain.get_block_by_height(head).await?.header())
    }
}
