// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity Store collaborator interface.
//!
//! Pairing state and message persistence live behind this trait; the
//! router never touches identity rows directly.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::types::{Identity, UnifiedMessage};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up the identity behind a (channel, channel_user_id) pair.
    async fn get_user_by_channel(
        &self,
        channel: &str,
        channel_user_id: &str,
    ) -> Result<Option<Identity>, TollgateError>;

    /// Insert or update an identity (upsert on the channel pair).
    async fn create_or_update_user(&self, identity: &Identity) -> Result<(), TollgateError>;

    /// Persist a message that passed the pipeline.
    async fn store_message(&self, msg: &UnifiedMessage) -> Result<(), TollgateError>;

    /// The channel a user prefers for outbound delivery, if any.
    async fn get_preferred_channel(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, TollgateError>;

    /// Every channel linked to the user, preferred first.
    async fn get_linked_channels(&self, user_id: &str) -> Result<Vec<String>, TollgateError>;
}
