//! SQLite storage backend for ChainScan.
//!
//! Persists the scan cursor, block headers and unscanned records to a single
//! SQLite file. Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use chainscan_storage::sqlite::SqliteScanStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteScanStore::open("./scanner.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteScanStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use chainscan_core::cursor::ScanCursor;
use chainscan_core::error::ScanError;
use chainscan_core::store::ScanCursorStore;
use chainscan_core::types::{BlockHeader, UnscanRecord};

fn storage_err(e: sqlx::Error) -> ScanError {
    ScanError::Storage(e.to_string())
}

/// SQLite-backed storage for the cursor, headers and unscanned records.
pub struct SqliteScanStore {
    pool: SqlitePool,
}

impl SqliteScanStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./scanner.db"`) or a full
    /// SQLite URL (`"sqlite:./scanner.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, ScanError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, ScanError> {
        // A single connection, otherwise every pooled connection gets its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), ScanError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        // Single-row cursor table
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scan_cursor (
                id          INTEGER PRIMARY KEY CHECK (id = 0),
                height      INTEGER NOT NULL,
                hash        TEXT    NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS block_headers (
                height        INTEGER PRIMARY KEY,
                hash          TEXT    NOT NULL,
                previous_hash TEXT    NOT NULL,
                timestamp     INTEGER NOT NULL,
                merkle_root   TEXT    NOT NULL,
                tx_count      INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS unscan_records (
                id          TEXT    PRIMARY KEY,
                height      INTEGER NOT NULL,
                tx_id       TEXT,
                reason      TEXT    NOT NULL,
                created_at  INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_unscan_height ON unscan_records (height);")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }
}

fn header_from_row(r: &SqliteRow) -> BlockHeader {
    BlockHeader {
        height: r.get::<i64, _>("height") as u64,
        hash: r.get("hash"),
        previous_hash: r.get("previous_hash"),
        timestamp: r.get("timestamp"),
        merkle_root: r.get("merkle_root"),
        tx_count: r.get::<i64, _>("tx_count") as u32,
        is_fork: false,
    }
}

// ─── ScanCursorStore impl ────────────────────────────────────────────────────

#[async_trait]
impl ScanCursorStore for SqliteScanStore {
    async fn get_cursor(&self) -> Result<Option<ScanCursor>, ScanError> {
        let row = sqlx::query("SELECT height, hash FROM scan_cursor WHERE id = 0")
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.map(|r| ScanCursor::new(r.get::<i64, _>("height") as u64, r.get::<String, _>("hash"))))
    }

    async fn save_cursor(&self, height: u64, hash: &str) -> Result<(), ScanError> {
        sqlx::query("INSERT OR REPLACE INTO scan_cursor (id, height, hash) VALUES (0, ?, ?)")
            .bind(height as i64)
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        debug!(height, hash, "cursor saved");
        Ok(())
    }

    async fn save_block_header(&self, header: &BlockHeader) -> Result<(), ScanError> {
        sqlx::query(
            "INSERT OR REPLACE INTO block_headers
             (height, hash, previous_hash, timestamp, merkle_root, tx_count)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(header.height as i64)
        .bind(&header.hash)
        .bind(&header.previous_hash)
        .bind(header.timestamp)
        .bind(&header.merkle_root)
        .bind(header.tx_count as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn get_block_header(&self, height: u64) -> Result<Option<BlockHeader>, ScanError> {
        let row = sqlx::query(
            "SELECT height, hash, previous_hash, timestamp, merkle_root, tx_count
             FROM block_headers WHERE height = ?",
        )
        .bind(height as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.as_ref().map(header_from_row))
    }

    async fn prune_block_headers_below(&self, height: u64) -> Result<(), ScanError> {
        let result = sqlx::query("DELETE FROM block_headers WHERE height < ?")
            .bind(height as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() > 0 {
            debug!(below = height, pruned = result.rows_affected(), "block headers pruned");
        }
        Ok(())
    }

    async fn save_unscan_record(&self, record: &UnscanRecord) -> Result<(), ScanError> {
        sqlx::query(
            "INSERT OR REPLACE INTO unscan_records (id, height, tx_id, reason, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(record.height as i64)
        .bind(&record.tx_id)
        .bind(&record.reason)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(height = record.height, reason = %record.reason, "unscan record saved");
        Ok(())
    }

    async fn delete_unscan_records_at_height(&self, height: u64) -> Result<(), ScanError> {
        sqlx::query("DELETE FROM unscan_records WHERE height = ?")
            .bind(height as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    async fn list_unscan_records(&self) -> Result<Vec<UnscanRecord>, ScanError> {
        let rows = sqlx::query(
            "SELECT id, height, tx_id, reason, created_at
             FROM unscan_records ORDER BY height, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|r| UnscanRecord {
                id: r.get("id"),
                height: r.get::<i64, _>("height") as u64,
                tx_id: r.get("tx_id"),
                reason: r.get("reason"),
                created_at: r.get("created_at"),
            })
            .collect())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
