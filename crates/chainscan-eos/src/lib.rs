//! chainscan-eos — EOSIO block scanner.
//!
//! Reads blocks from a node through [`ChainReader`], decodes token transfers
//! with contract ABIs and hands them to observers, keyed by the host's
//! tracking keys.

pub mod abi;
pub mod builder;
pub mod cache;
pub mod chain;
pub mod codec;
pub mod decoder;
pub mod fork;
pub mod pipeline;
pub mod scan_loop;

pub use abi::Abi;
pub use builder::ScannerBuilder;
pub use cache::{AbiCache, MemoryAbiCache};
pub use chain::{AccountInfo, Action, Block, ChainReader, TransactionReceipt};
pub use codec::{Asset, CodecError};
pub use decoder::{ActionDecoder, Transfer};
pub use pipeline::{BlockContext, ExtractionPipeline, ExtractionSummary, TxExtractor};
pub use scan_loop::EosBlockScanner;
