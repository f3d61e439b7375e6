// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use async_trait::async_trait;

use tollgate_core::TollgateError;
use tollgate_core::traits::Sanitizer;
use tollgate_core::types::{Recommendation, SanitizeVerdict};

/// Sanitizer double. Text containing `block_marker` is blocked, text
/// containing `escalate_marker` is escalated, everything else is allowed
/// with surrounding whitespace trimmed.
pub struct MockSanitizer {
    block_marker: String,
    escalate_marker: String,
    delay: Option<Duration>,
}

impl MockSanitizer {
    pub fn new() -> Self {
        Self {
            block_marker: "[[block]]".to_string(),
            escalate_marker: "[[escalate]]".to_string(),
            delay: None,
        }
    }

    /// Sleep before answering, to exercise pipeline timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Default for MockSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sanitizer for MockSanitizer {
    async fn sanitize(&self, text: &str) -> Result<SanitizeVerdict, TollgateError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let recommendation = if text.contains(&self.block_marker) {
            Recommendation::Block
        } else if text.contains(&self.escalate_marker) {
            Recommendation::Escalate
        } else {
            Recommendation::Allow
        };
        Ok(SanitizeVerdict {
            sanitized_text: text.trim().to_string(),
            recommendation,
        })
    }
}
