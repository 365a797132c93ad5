//! chainscan-storage — pluggable [`ScanCursorStore`] backends.
//!
//! Backends:
//! - [`memory`] — in-memory (dev/testing, no persistence)
//! - [`sqlite`] — SQLite via `sqlx` (embedded, single-file persistence)
//!
//! [`ScanCursorStore`]: chainscan_core::ScanCursorStore

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryScanStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteScanStore;
