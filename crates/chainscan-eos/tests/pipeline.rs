mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chainscan_core::error::ScanError;
use chainscan_core::observer::ObserverRegistry;
use chainscan_core::resolver::{AccountResolver, IdentityResolver};
use chainscan_core::types::TxDirection;
use chainscan_eos::{
    ActionDecoder, BlockContext, ExtractionPipeline, MemoryAbiCache, TxExtractor,
};
use chainscan_storage::MemoryScanStore;

use common::*;

struct Setup {
    chain: Arc<MockChain>,
    store: Arc<MemoryScanStore>,
    observer: Arc<RecordingObserver>,
    pipeline: ExtractionPipeline,
}

fn setup(chain: MockChain, resolver: Arc<dyn AccountResolver>, max_extracting: usize) -> Setup {
    let chain = Arc::new(chain);
    let store = Arc::new(MemoryScanStore::new());
    let observer = Arc::new(RecordingObserver::new());
    let mut observers = ObserverRegistry::new();
    observers.add(observer.clone());

    let decoder = Arc::new(ActionDecoder::new(
        chain.clone(),
        Arc::new(MemoryAbiCache::new()),
        "ABI_",
    ));
    let extractor = Arc::new(TxExtractor::new(decoder, resolver, "transfer", "executed"));
    let pipeline = ExtractionPipeline::new(extractor, store.clone(), observers, max_extracting);

    Setup {
        chain,
        store,
        observer,
        pipeline,
    }
}

fn ctx() -> BlockContext {
    BlockContext {
        height: 7,
        hash: block_id(7, "a"),
        time: BLOCK_UNIX,
    }
}

fn keys(map: &[(&str, &str)]) -> Arc<dyn AccountResolver> {
    let map: HashMap<String, String> = map
        .iter()
        .map(|(alias, key)| (alias.to_string(), key.to_string()))
        .collect();
    Arc::new(map)
}

#[tokio::test]
async fn same_key_on_both_sides_is_one_record() {
    let chain = MockChain::new();
    chain.deploy_token("eosio.token");
    let s = setup(chain, keys(&[("alice", "K1"), ("bob", "K1")]), 2);

    let txs = vec![transfer_receipt("t", "eosio.token", "alice", "bob", "1.0000 EOS")];
    let summary = s.pipeline.extract(&ctx(), &txs).await.unwrap();

    assert_eq!(summary.records, 1);
    let extracted = s.observer.extracted();
    assert_eq!(extracted[0].0, "K1");
    assert_eq!(extracted[0].1.direction, TxDirection::Both);
}

#[tokio::test]
async fn distinct_keys_get_input_and_output() {
    let chain = MockChain::new();
    chain.deploy_token("eosio.token");
    let s = setup(chain, keys(&[("alice", "K1"), ("bob", "K2")]), 2);

    let txs = vec![transfer_receipt("t", "eosio.token", "alice", "bob", "1.0000 EOS")];
    s.pipeline.extract(&ctx(), &txs).await.unwrap();

    let mut seen: Vec<(String, TxDirection)> = s
        .observer
        .extracted()
        .into_iter()
        .map(|(k, tx)| (k, tx.direction))
        .collect();
    seen.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        seen,
        vec![
            ("K1".to_string(), TxDirection::Input),
            ("K2".to_string(), TxDirection::Output),
        ]
    );
}

#[tokio::test]
async fn unwatched_accounts_produce_nothing() {
    let chain = MockChain::new();
    chain.deploy_token("eosio.token");
    let s = setup(chain, keys(&[("zed", "K9")]), 2);

    let txs = vec![transfer_receipt("t", "eosio.token", "alice", "bob", "1.0000 EOS")];
    let summary = s.pipeline.extract(&ctx(), &txs).await.unwrap();

    assert_eq!(summary.records, 0);
    assert!(s.observer.extracted().is_empty());
}

#[tokio::test]
async fn identity_resolver_watches_both_sides() {
    let chain = MockChain::new();
    chain.deploy_token("eosio.token");
    let s = setup(chain, Arc::new(IdentityResolver), 2);

    let txs = vec![transfer_receipt("t", "eosio.token", "alice", "bob", "1.0000 EOS")];
    s.pipeline.extract(&ctx(), &txs).await.unwrap();

    let mut keys: Vec<String> = s.observer.extracted().into_iter().map(|(k, _)| k).collect();
    keys.sort();
    assert_eq!(keys, vec!["alice", "bob"]);
}

#[tokio::test]
async fn every_transfer_in_a_transaction_is_extracted() {
    let chain = MockChain::new();
    chain.deploy_token("eosio.token");
    let s = setup(chain, keys(&[("alice", "K1")]), 2);

    let txs = vec![receipt(
        "multi",
        "executed",
        &[
            ("eosio.token", "transfer", transfer_data("alice", "bob", "1.0000 EOS", "a")),
            ("eosio.token", "transfer", transfer_data("alice", "carol", "2.0000 EOS", "b")),
            // not a transfer; never decoded
            ("eosio.token", "open", vec![0xff]),
        ],
    )];
    let summary = s.pipeline.extract(&ctx(), &txs).await.unwrap();

    assert_eq!(summary.records, 2);
    let mut memos: Vec<String> = s.observer.extracted().into_iter().map(|(_, tx)| tx.memo).collect();
    memos.sort();
    assert_eq!(memos, vec!["a", "b"]);
}

#[tokio::test]
async fn failures_are_counted_and_recorded() {
    let chain = MockChain::new();
    chain.deploy_token("eosio.token");
    let s = setup(chain, Arc::new(IdentityResolver), 3);

    let txs = vec![
        transfer_receipt("ok1", "eosio.token", "alice", "bob", "1.0000 EOS"),
        transfer_receipt("nope1", "missing", "alice", "bob", "1.0000 EOS"),
        transfer_receipt("ok2", "eosio.token", "alice", "bob", "1.0000 EOS"),
        // malformed arguments for a known contract
        receipt("nope2", "executed", &[("eosio.token", "transfer", vec![1, 2, 3])]),
    ];
    let err = s.pipeline.extract(&ctx(), &txs).await.unwrap_err();

    assert!(matches!(
        err,
        ScanError::PartialExtraction {
            height: 7,
            failed: 2,
            total: 4
        }
    ));
    let mut failed: Vec<String> = s
        .store
        .records_at(7)
        .into_iter()
        .filter_map(|r| r.tx_id)
        .collect();
    failed.sort();
    assert_eq!(failed, vec!["nope1", "nope2"]);
    // successful transactions were still delivered
    assert_eq!(s.observer.extracted().len(), 4);
}

#[tokio::test]
async fn concurrency_stays_under_ceiling() {
    let chain = MockChain::new();
    chain.slow_abi(Duration::from_millis(20));
    let contracts: Vec<String> = (0..25).map(|i| format!("token{}", (b'a' + i as u8) as char)).collect();
    for contract in &contracts {
        chain.deploy_token(contract);
    }
    let s = setup(chain, Arc::new(IdentityResolver), 4);

    let txs: Vec<_> = contracts
        .iter()
        .enumerate()
        .map(|(i, c)| transfer_receipt(&format!("tx{i}"), c, "alice", "bob", "1.0000 EOS"))
        .collect();
    let summary = s.pipeline.extract(&ctx(), &txs).await.unwrap();

    assert_eq!(summary.total, 25);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.records, 50);
    assert_eq!(s.chain.abi_calls.load(Ordering::SeqCst), 25);
    let peak = s.chain.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak concurrency {peak} exceeded ceiling");
    assert!(peak > 1, "workers never overlapped");
}

#[tokio::test]
async fn empty_block_is_a_no_op() {
    let s = setup(MockChain::new(), Arc::new(IdentityResolver), 4);
    let summary = s.pipeline.extract(&ctx(), &[]).await.unwrap();
    assert_eq!(summary.total, 0);
    assert!(s.store.records_at(7).is_empty());
}
