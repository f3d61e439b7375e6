// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `tollgate-core::types` for use across
//! trait boundaries. This module re-exports them for convenience within the
//! storage crate.

pub use tollgate_core::types::{
    AuditEvent, Identity, RateBucket, Role, RoleGrant, UnifiedMessage,
};
