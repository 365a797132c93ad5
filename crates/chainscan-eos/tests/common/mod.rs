//! Shared fixtures: an in-memory chain, a recording observer and block builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use chainscan_core::error::ScanError;
use chainscan_core::observer::ScanObserver;
use chainscan_core::types::{BlockHeader, ExtractedTx};
use chainscan_eos::chain::{
    AccountInfo, Block, Compression, PackedTransaction, ReceiptTrx, TransactionReceipt,
};
use chainscan_eos::codec::BinaryWriter;
use chainscan_eos::{Abi, ChainReader};

pub const BLOCK_TIME: &str = "2019-01-24T19:32:05.500";
pub const BLOCK_UNIX: i64 = 1_548_358_325;

pub fn token_abi() -> Abi {
    serde_json::from_str(
        r#"{
            "version": "eosio::abi/1.1",
            "types": [{ "new_type_name": "account_name", "type": "name" }],
            "structs": [{ "name": "transfer", "base": "", "fields": [
                { "name": "from", "type": "account_name" },
                { "name": "to", "type": "account_name" },
                { "name": "quantity", "type": "asset" },
                { "name": "memo", "type": "string" }
            ]}],
            "actions": [{ "name": "transfer", "type": "transfer", "ricardian_contract": "" }]
        }"#,
    )
    .unwrap()
}

/// Block id on a given branch, e.g. `block_id(100, "a")`.
pub fn block_id(height: u64, branch: &str) -> String {
    format!("{height:08x}{branch}")
}

// ─── Chain ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockChain {
    head: Mutex<u64>,
    blocks: Mutex<HashMap<u64, Block>>,
    abis: Mutex<HashMap<String, Abi>>,
    fail_head: AtomicBool,
    abi_delay: Mutex<Option<Duration>>,
    pub abi_calls: AtomicU32,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }

    pub fn put_block(&self, block: Block) {
        self.blocks.lock().unwrap().insert(block.block_num, block);
    }

    /// Linear chain `from..=to` on `branch`, each block pointing at its
    /// predecessor on the same branch. Sets the head to `to`.
    pub fn extend(&self, from: u64, to: u64, branch: &str, parent_of_first: &str) {
        let mut previous = parent_of_first.to_string();
        for height in from..=to {
            let block = empty_block(height, &block_id(height, branch), &previous);
            previous = block.id.clone();
            self.put_block(block);
        }
        self.set_head(to);
    }

    pub fn block(&self, height: u64) -> Block {
        self.blocks.lock().unwrap()[&height].clone()
    }

    pub fn add_receipt(&self, height: u64, receipt: TransactionReceipt) {
        self.blocks
            .lock()
            .unwrap()
            .get_mut(&height)
            .unwrap()
            .transactions
            .push(receipt);
    }

    pub fn deploy_token(&self, account: &str) {
        self.abis.lock().unwrap().insert(account.into(), token_abi());
    }

    pub fn fail_head(&self, fail: bool) {
        self.fail_head.store(fail, Ordering::SeqCst);
    }

    pub fn slow_abi(&self, delay: Duration) {
        *self.abi_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn get_chain_head(&self) -> Result<u64, ScanError> {
        if self.fail_head.load(Ordering::SeqCst) {
            return Err(ScanError::Rpc("connection refused".into()));
        }
        Ok(*self.head.lock().unwrap())
    }

    async fn get_block_by_height(&self, height: u64) -> Result<Block, ScanError> {
        self.blocks
            .lock()
            .unwrap()
            .get(&height)
            .cloned()
            .ok_or_else(|| ScanError::Rpc(format!("block {height} not found")))
    }

    async fn get_account(&self, name: &str) -> Result<AccountInfo, ScanError> {
        Ok(AccountInfo {
            account_name: name.into(),
            head_block_num: *self.head.lock().unwrap(),
            created: BLOCK_TIME.into(),
            privileged: false,
        })
    }

    async fn get_abi(&self, account: &str) -> Result<Abi, ScanError> {
        self.abi_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.abi_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let abi = self.abis.lock().unwrap().get(account).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        abi.ok_or_else(|| ScanError::Rpc(format!("no ABI deployed at {account}")))
    }
}

// ─── Blocks & receipts ────────────────────────────────────────────────────────

pub fn empty_block(height: u64, id: &str, previous: &str) -> Block {
    Block {
        block_num: height,
        id: id.into(),
        previous: previous.into(),
        timestamp: BLOCK_TIME.into(),
        producer: "eosio".into(),
        transaction_mroot: "0".repeat(64),
        transactions: vec![],
    }
}

/// Serialized token transfer arguments.
pub fn transfer_data(from: &str, to: &str, quantity: &str, memo: &str) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_name(from).unwrap();
    w.write_name(to).unwrap();
    w.write_asset(&quantity.parse().unwrap());
    w.write_string(memo);
    w.into_bytes()
}

/// `(contract, action, data)` triples packed into one binary transaction.
pub fn packed_trx(actions: &[(&str, &str, Vec<u8>)]) -> String {
    let mut w = BinaryWriter::new();
    w.write_u32(1_548_358_385)
        .write_u16(0x1234)
        .write_u32(0x5678_9abc)
        .write_varuint32(0)
        .write_u8(0)
        .write_varuint32(0)
        .write_varuint32(0)
        .write_varuint32(actions.len() as u32);
    for (contract, name, data) in actions {
        w.write_name(contract).unwrap();
        w.write_name(name).unwrap();
        w.write_varuint32(1);
        w.write_name("alice").unwrap();
        w.write_name("active").unwrap();
        w.write_blob(data);
    }
    w.write_varuint32(0);
    w.into_hex()
}

pub fn receipt(tx_id: &str, status: &str, actions: &[(&str, &str, Vec<u8>)]) -> TransactionReceipt {
    TransactionReceipt {
        status: status.into(),
        cpu_usage_us: 100,
        net_usage_words: 16,
        trx: ReceiptTrx::Packed(PackedTransaction {
            id: tx_id.into(),
            signatures: vec![],
            compression: Compression::None,
            packed_context_free_data: String::new(),
            packed_trx: packed_trx(actions),
            transaction: None,
        }),
    }
}

/// Executed transaction with a single transfer.
pub fn transfer_receipt(
    tx_id: &str,
    contract: &str,
    from: &str,
    to: &str,
    quantity: &str,
) -> TransactionReceipt {
    receipt(
        tx_id,
        "executed",
        &[(contract, "transfer", transfer_data(from, to, quantity, "memo"))],
    )
}

// ─── Observer ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingObserver {
    pub headers: Mutex<Vec<BlockHeader>>,
    pub extracted: Mutex<Vec<(String, ExtractedTx)>>,
    failing: AtomicBool,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn headers(&self) -> Vec<BlockHeader> {
        self.headers.lock().unwrap().clone()
    }

    pub fn extracted(&self) -> Vec<(String, ExtractedTx)> {
        self.extracted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanObserver for RecordingObserver {
    async fn on_new_header(&self, header: &BlockHeader) {
        self.headers.lock().unwrap().push(header.clone());
    }

    async fn on_extracted_data(&self, key: &str, tx: &ExtractedTx) -> Result<(), ScanError> {
        self.extracted.lock().unwrap().push((key.to_string(), tx.clone()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(ScanError::Other("wallet db unavailable".into()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recorder"
    }
}
