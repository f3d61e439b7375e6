// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Tollgate gateway.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, typed CRUD for
//! identities and messages, and the SQLite IdentityStore implementation.
//!
//! The rate limiter, permission engine, and audit ledger own their table
//! SQL (their tables are created by this crate's migrations) and issue it
//! through the shared [`Database`] handle, so every read-modify-write is
//! serialized on one background thread.

pub mod database;
pub mod identity;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{Database, map_tr_err};
pub use identity::SqliteIdentityStore;
