//! EOSIO chain model and the node reader trait.
//!
//! Types deserialize straight from nodeos `get_block` / `get_account` JSON.
//! Receipts carry either a bare transaction id (deferred transactions) or the
//! packed transaction; actions are read from the node's decoded `transaction`
//! field when present and unpacked from `packed_trx` otherwise.

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use chainscan_core::error::ScanError;
use chainscan_core::types::BlockHeader;

use crate::abi::Abi;
use crate::codec::{decode_hex, BinaryReader, CodecError};

/// Reads chain state from an EOSIO node.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current head block number.
    async fn get_chain_head(&self) -> Result<u64, ScanError>;
    async fn get_block_by_height(&self, height: u64) -> Result<Block, ScanError>;
    async fn get_account(&self, name: &str) -> Result<AccountInfo, ScanError>;
    /// ABI of the contract deployed at `account`.
    async fn get_abi(&self, account: &str) -> Result<Abi, ScanError>;
}

// ─── Block ────────────────────────────────────────────────────────────────────

/// A block as returned by `get_block`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub block_num: u64,
    pub id: String,
    pub previous: String,
    /// UTC timestamp without zone, e.g. `"2019-01-24T19:32:05.500"`.
    pub timestamp: String,
    #[serde(default)]
    pub producer: String,
    #[serde(default)]
    pub transaction_mroot: String,
    #[serde(default)]
    pub transactions: Vec<TransactionReceipt>,
}

impl Block {
    /// Block time in unix seconds (0 if the node sent an unparseable time).
    pub fn unix_time(&self) -> i64 {
        parse_block_time(&self.timestamp).unwrap_or(0)
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            height: self.block_num,
            hash: self.id.clone(),
            previous_hash: self.previous.clone(),
            timestamp: self.unix_time(),
            merkle_root: self.transaction_mroot.clone(),
            tx_count: self.transactions.len() as u32,
            is_fork: false,
        }
    }
}

/// Parse a nodeos timestamp into unix seconds.
pub fn parse_block_time(s: &str) -> Option<i64> {
    let s = s.trim_end_matches('Z');
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(Utc.from_utc_datetime(&naive).timestamp())
}

// ─── Receipts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// `"executed"`, `"soft_fail"`, `"hard_fail"`, `"delayed"` or `"expired"`.
    pub status: String,
    #[serde(default)]
    pub cpu_usage_us: u32,
    #[serde(default)]
    pub net_usage_words: u32,
    pub trx: ReceiptTrx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReceiptTrx {
    /// Deferred transaction, only the id is known.
    Id(String),
    Packed(PackedTransaction),
}

impl TransactionReceipt {
    pub fn tx_id(&self) -> &str {
        match &self.trx {
            ReceiptTrx::Id(id) => id,
            ReceiptTrx::Packed(p) => &p.id,
        }
    }

    /// `true` when there is a transaction body to decode.
    pub fn has_payload(&self) -> bool {
        match &self.trx {
            ReceiptTrx::Id(_) => false,
            ReceiptTrx::Packed(p) => p.transaction.is_some() || !p.packed_trx.is_empty(),
        }
    }

    /// Actions of the transaction, empty for id-only receipts.
    pub fn actions(&self) -> Result<Vec<Action>, CodecError> {
        match &self.trx {
            ReceiptTrx::Id(_) => Ok(vec![]),
            ReceiptTrx::Packed(p) => p.actions(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Zlib,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackedTransaction {
    pub id: String,
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub packed_context_free_data: String,
    /// Hex of the serialized transaction.
    #[serde(default)]
    pub packed_trx: String,
    /// Node-decoded form of `packed_trx`.
    #[serde(default)]
    pub transaction: Option<Transaction>,
}

impl PackedTransaction {
    /// Actions from the node-decoded body, unless some action lost its
    /// serialized arguments and `packed_trx` can supply them.
    pub fn actions(&self) -> Result<Vec<Action>, CodecError> {
        if let Some(trx) = &self.transaction {
            if self.packed_trx.is_empty() || trx.actions.iter().all(Action::has_raw_data) {
                return Ok(trx.actions.clone());
            }
        }
        if self.packed_trx.is_empty() {
            return Ok(vec![]);
        }
        Ok(self.unpack()?.actions)
    }

    /// Deserialize `packed_trx`.
    pub fn unpack(&self) -> Result<Transaction, CodecError> {
        if self.compression != Compression::None {
            return Err(CodecError::UnsupportedCompression(format!("{:?}", self.compression)));
        }
        let bytes = decode_hex(&self.packed_trx)?;
        Transaction::read(&mut BinaryReader::new(&bytes))
    }
}

/// Transaction body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub expiration: String,
    #[serde(default)]
    pub ref_block_num: u16,
    #[serde(default)]
    pub ref_block_prefix: u32,
    #[serde(default)]
    pub max_net_usage_words: u32,
    #[serde(default)]
    pub max_cpu_usage_ms: u8,
    #[serde(default)]
    pub delay_sec: u32,
    #[serde(default)]
    pub context_free_actions: Vec<Action>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Transaction {
    fn read(r: &mut BinaryReader<'_>) -> Result<Self, CodecError> {
        let expiration = r.read_u32()?;
        let ref_block_num = r.read_u16()?;
        let ref_block_prefix = r.read_u32()?;
        let max_net_usage_words = r.read_varuint32()?;
        let max_cpu_usage_ms = r.read_u8()?;
        let delay_sec = r.read_varuint32()?;
        let context_free_actions = read_actions(r)?;
        let actions = read_actions(r)?;
        // transaction_extensions are not needed

        Ok(Self {
            expiration: Utc
                .timestamp_opt(expiration as i64, 0)
                .single()
                .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or_default(),
            ref_block_num,
            ref_block_prefix,
            max_net_usage_words,
            max_cpu_usage_ms,
            delay_sec,
            context_free_actions,
            actions,
        })
    }
}

fn read_actions(r: &mut BinaryReader<'_>) -> Result<Vec<Action>, CodecError> {
    let count = r.read_varuint32()?;
    (0..count).map(|_| Action::read(r)).collect()
}

// ─── Actions ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: String,
    pub permission: String,
}

/// A contract action. `account` is the contract, `name` the action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub account: String,
    pub name: String,
    #[serde(default)]
    pub authorization: Vec<PermissionLevel>,
    /// Node-decoded arguments, or a hex string when the node lacks the ABI.
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub hex_data: String,
}

impl Action {
    fn read(r: &mut BinaryReader<'_>) -> Result<Self, CodecError> {
        let account = r.read_name()?;
        let name = r.read_name()?;
        let auth_count = r.read_varuint32()?;
        let authorization = (0..auth_count)
            .map(|_| {
                Ok(PermissionLevel {
                    actor: r.read_name()?,
                    permission: r.read_name()?,
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;
        let data = r.read_blob()?;
        Ok(Self {
            account,
            name,
            authorization,
            data: serde_json::Value::Null,
            hex_data: hex::encode(data),
        })
    }

    /// `false` when the node replaced the arguments with decoded JSON and
    /// sent no `hex_data`.
    pub fn has_raw_data(&self) -> bool {
        !self.hex_data.is_empty() || self.data.is_string() || self.data.is_null()
    }

    /// Serialized action arguments.
    pub fn raw_data(&self) -> Result<Vec<u8>, CodecError> {
        if !self.hex_data.is_empty() {
            return decode_hex(&self.hex_data);
        }
        match &self.data {
            serde_json::Value::String(hex) => decode_hex(hex),
            serde_json::Value::Null => Ok(vec![]),
            _ => Err(CodecError::MissingPayload(format!("{}::{}", self.account, self.name))),
        }
    }
}

// ─── Accounts ─────────────────────────────────────────────────────────────────

/// Subset of `get_account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_name: String,
    #[serde(default)]
    pub head_block_num: u64,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub privileged: bool,
}
