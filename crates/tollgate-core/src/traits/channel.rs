// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for messaging platform integrations.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::types::{SendReceipt, UnifiedMessage};

/// Adapter for a bidirectional messaging channel.
///
/// The router treats every adapter identically: it never inspects
/// platform-specific payloads, only `UnifiedMessage`s.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Unique adapter name, used as the registry key and the channel name
    /// on messages.
    fn name(&self) -> &str;

    /// Establishes a connection to the messaging platform.
    async fn connect(&self) -> Result<(), TollgateError>;

    /// Tears the connection down.
    async fn disconnect(&self) -> Result<(), TollgateError>;

    /// Delivers an outbound message to the platform.
    async fn send_message(&self, msg: &UnifiedMessage) -> Result<SendReceipt, TollgateError>;

    /// Converts a platform-native payload into the channel-agnostic form.
    ///
    /// Payloads cross the trait boundary as JSON values so the router
    /// stays ignorant of adapter wire shapes. A payload that does not
    /// decode is a [`TollgateError::Validation`].
    fn to_unified(&self, raw: serde_json::Value) -> Result<UnifiedMessage, TollgateError>;

    /// Converts a unified message back into the platform-native payload.
    fn from_unified(&self, msg: &UnifiedMessage) -> Result<serde_json::Value, TollgateError>;
}
