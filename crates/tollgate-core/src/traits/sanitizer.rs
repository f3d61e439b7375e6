// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External content sanitizer interface.

use async_trait::async_trait;

use crate::error::TollgateError;
use crate::types::SanitizeVerdict;

/// Inspects inbound content and recommends allow / block / escalate.
///
/// `block` and `escalate` both short-circuit the pipeline; on `allow` the
/// sanitized text replaces the original message content.
#[async_trait]
pub trait Sanitizer: Send + Sync {
    async fn sanitize(&self, text: &str) -> Result<SanitizeVerdict, TollgateError>;
}
