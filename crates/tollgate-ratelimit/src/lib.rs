// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-bucket rate limiting with dual-window cost budgets.
//!
//! Every (entity_type, entity_id) pair owns an independent bucket:
//! continuous refill up to `max_tokens`, plus hourly and daily spend caps
//! that reset lazily when their window elapses. `check` answers without
//! mutating; `consume` re-validates and applies atomically.

pub mod bucket;
pub mod limiter;

pub use bucket::{RateDecision, RateDenyReason};
pub use limiter::{RateLimiter, RateStats};
