// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit ledger for Tollgate security decisions.
//!
//! The ledger is the tamper-evident record everything above it writes to:
//! routing attempts, rate decisions, permission checks, role changes.
//! Mutation is exposed only through `log_event`; the retention sweep in
//! `cleanup_old_events` is the sole deletion path.

pub mod export;
pub mod ledger;
pub mod window;

pub use export::ExportFormat;
pub use ledger::{AuditLedger, AuditStats, EventFilter, EventPage, NewAuditEvent};
pub use window::parse_since;
