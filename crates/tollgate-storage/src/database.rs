// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and
//! embedded migrations.
//!
//! All reads and writes are serialized through tokio-rusqlite's single
//! background thread: `Database` IS the single writer. Query code accepts
//! `&Database` and goes through `connection().call()`. Do NOT create
//! additional Connection instances for writes.

use tollgate_config::StorageConfig;
use tollgate_core::TollgateError;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into TollgateError::Storage.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TollgateError {
    TollgateError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the single-writer SQLite connection.
///
/// Cloning is cheap: clones share the same background connection thread,
/// which is what gives multi-statement `call` closures their per-key
/// serializability.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, TollgateError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| TollgateError::Storage {
                source: Box::new(e),
            })?;
        Self::setup(conn, true).await
    }

    /// Open the configured database, honoring the WAL setting.
    pub async fn open_with(config: &StorageConfig) -> Result<Self, TollgateError> {
        let conn = tokio_rusqlite::Connection::open(&config.database_path)
            .await
            .map_err(|e| TollgateError::Storage {
                source: Box::new(e),
            })?;
        Self::setup(conn, config.wal_mode).await
    }

    /// Open an in-memory database with the full schema applied. Test use.
    pub async fn open_in_memory() -> Result<Self, TollgateError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| TollgateError::Storage {
                source: Box::new(e),
            })?;
        Self::setup(conn, false).await
    }

    async fn setup(conn: tokio_rusqlite::Connection, wal: bool) -> Result<Self, TollgateError> {
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal {
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
            }
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5_000)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e| TollgateError::Storage {
                source: Box::new(e),
            })?;

        debug!("database opened, pragmas applied, migrations current");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL. Called on orderly shutdown.
    pub async fn close(&self) -> Result<(), TollgateError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
