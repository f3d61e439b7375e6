// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel mutual exclusion.
//!
//! One lock per channel name, created lazily on first use and cached for
//! the router's lifetime. The map grows monotonically and is never
//! pruned; channel cardinality is bounded by configuration, not traffic.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct ChannelLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChannelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for a channel. The DashMap entry API guards creation, so
    /// two racing callers always receive the same lock object; the shard
    /// lock is held only for the insert, never during pipeline execution.
    pub fn lock_for(&self, channel: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(channel.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
