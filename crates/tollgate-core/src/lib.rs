// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tollgate messaging-gateway trust boundary.
//!
//! This crate holds the shared data model (`UnifiedMessage`, roles, rate
//! buckets, audit events), the error taxonomy, and the narrow traits the
//! router uses to talk to external collaborators.

pub mod error;
pub mod traits;
pub mod types;

pub use error::TollgateError;
pub use types::{
    AuditEvent, AuditEventType, AuditStatus, Direction, EntityType, Identity, RateBucket,
    RejectReason, Role, RoleGrant, SendReceipt, UnifiedMessage,
};

pub use traits::{ChannelAdapter, IdentityStore, MessageHandler, Sanitizer};
