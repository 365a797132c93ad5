//! chainscan-core — foundation for the fork-tolerant, crash-resumable block scanner.
//!
//! # Architecture
//!
//! ```text
//! ScannerBuilder → EosBlockScanner
//!                             ├── ChainReader        (head, blocks, accounts, ABIs)
//!                             ├── ExtractionPipeline (bounded per-transaction workers)
//!                             ├── ScanCursorStore    (cursor, headers, unscanned records)
//!                             ├── AccountResolver    (chain alias → tracking key)
//!                             └── ObserverRegistry   (header + extracted-data subscribers)
//! ```
//!
//! This crate holds everything that is not specific to a chain family; the
//! EOSIO scanner lives in `chainscan-eos` and storage backends in
//! `chainscan-storage`.

pub mod config;
pub mod cursor;
pub mod error;
pub mod observer;
pub mod resolver;
pub mod scanner;
pub mod store;
pub mod types;

pub use config::{ScanState, ScannerConfig};
pub use cursor::ScanCursor;
pub use error::ScanError;
pub use observer::{ObserverRegistry, ScanObserver};
pub use resolver::AccountResolver;
pub use scanner::{BlockScanner, ContractDecoder};
pub use store::ScanCursorStore;
pub use types::{BlockHeader, ExtractedTx, ExtractionResult, TxDirection, UnscanRecord};
