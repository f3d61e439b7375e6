// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Role-based authorization with wildcard permission matching.
//!
//! Permissions are `resource:action` strings; either segment may be `*`.
//! Users hold roles, roles hold permission sets, and a check succeeds when
//! any permission from any non-expired granted role matches the required
//! one. Role priority orders the resolved union but never vetoes a grant.

pub mod engine;
pub mod matcher;
pub mod roles;

pub use engine::{ELEVATED_PERMISSIONS, PermissionCheck, PermissionEngine};
pub use matcher::{matches_any, permission_matches, validate_permission};
