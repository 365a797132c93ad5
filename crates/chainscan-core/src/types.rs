//! Shared types for the scanning pipeline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ─── BlockHeader ──────────────────────────────────────────────────────────────

/// Header of a scanned block, persisted per height for fork-ancestry lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block number.
    pub height: u64,
    /// Block id.
    pub hash: String,
    /// Id of the parent block.
    pub previous_hash: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
    /// Transaction merkle root.
    pub merkle_root: String,
    /// Number of transaction receipts in the block.
    pub tx_count: u32,
    /// `true` when this header was superseded by a reorg.
    ///
    /// Only ever set on notification copies, never on a resumption point.
    #[serde(default)]
    pub is_fork: bool,
}

impl BlockHeader {
    /// Returns a copy flagged as forked, for reorg notifications.
    pub fn as_forked(&self) -> BlockHeader {
        BlockHeader {
            is_fork: true,
            ..self.clone()
        }
    }
}

// ─── UnscanRecord ─────────────────────────────────────────────────────────────

/// Reason attached to records written when an observer rejects extracted data.
pub const NOTIFY_FAILED_REASON: &str = "ExtractData Notify failed.";

/// Durable marker for a height (and optionally a transaction) whose extraction
/// or notification did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnscanRecord {
    /// Hex SHA-256 of `"{height}_{tx_id}"`; saving the same id twice overwrites.
    pub id: String,
    pub height: u64,
    pub tx_id: Option<String>,
    pub reason: String,
    /// Unix seconds when the record was created.
    pub created_at: i64,
}

impl UnscanRecord {
    pub fn new(height: u64, tx_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            id: Self::record_id(height, tx_id.as_deref()),
            height,
            tx_id,
            reason: reason.into(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Record marking an observer delivery failure for `tx_id` at `height`.
    pub fn notify_failed(height: u64, tx_id: impl Into<String>) -> Self {
        Self::new(height, Some(tx_id.into()), NOTIFY_FAILED_REASON)
    }

    /// Deterministic record id for a height / transaction pair.
    pub fn record_id(height: u64, tx_id: Option<&str>) -> String {
        let preimage = format!("{}_{}", height, tx_id.unwrap_or_default());
        hex::encode(Sha256::digest(preimage.as_bytes()))
    }
}

// ─── ExtractedTx ──────────────────────────────────────────────────────────────

/// Which side of a transfer a watched account is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxDirection {
    /// The watched account sent the transfer.
    Input,
    /// The watched account received the transfer.
    Output,
    /// Sender and receiver resolve to the same tracking key.
    Both,
}

impl std::fmt::Display for TxDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// A normalized token transfer relevant to one tracking key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTx {
    pub tx_id: String,
    pub from: String,
    pub to: String,
    /// Decimal amount without the symbol, e.g. `"10.0000"`.
    pub amount: String,
    pub symbol: String,
    pub decimals: u8,
    /// Account of the token contract that executed the transfer.
    pub contract_address: String,
    pub memo: String,
    pub block_height: u64,
    pub block_hash: String,
    /// Block time in unix seconds.
    pub confirm_time: i64,
    pub direction: TxDirection,
}

// ─── ExtractionResult ─────────────────────────────────────────────────────────

/// Per-transaction output of the extraction pipeline. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub tx_id: String,
    pub block_hash: String,
    pub block_height: u64,
    pub block_time: i64,
    pub success: bool,
    /// Tracking key → transfers relevant to that key.
    pub per_account: HashMap<String, Vec<ExtractedTx>>,
}

impl ExtractionResult {
    /// Total number of extracted records across all tracking keys.
    pub fn record_count(&self) -> usize {
        self.per_account.values().map(Vec::len).sum()
    }

    /// Add a record under `key`.
    pub fn push(&mut self, key: impl Into<String>, tx: ExtractedTx) {
        self.per_account.entry(key.into()).or_default().push(tx);
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
