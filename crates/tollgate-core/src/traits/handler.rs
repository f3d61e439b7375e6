// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message handler trait invoked after the security pipeline passes.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::types::UnifiedMessage;

/// A downstream consumer of accepted inbound messages.
///
/// Handlers run in registration order under the message's channel lock.
/// A handler error is reported per-handler and never aborts its siblings.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Name used in per-handler dispatch results.
    fn name(&self) -> &str;

    async fn handle(&self, msg: &UnifiedMessage) -> Result<(), TollgateError>;
}
