// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tollgate gateway core.

use thiserror::Error;

use crate::types::RejectReason;

/// The primary error type used across all Tollgate crates.
///
/// `Storage` is the transient variant: callers may retry it, unlike
/// `Denied`, which is a final decision carrying a machine-readable reason.
#[derive(Debug, Error)]
pub enum TollgateError {
    /// Malformed input rejected before any mutation (bad permission string,
    /// unknown event type or status, invalid config value).
    #[error("validation error: {0}")]
    Validation(String),

    /// A named entity (role, grant, adapter, channel) does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The trust boundary denied the operation. Never a bare boolean:
    /// the reason code is what adapters map to user-facing copy.
    #[error("denied: {reason}")]
    Denied { reason: RejectReason },

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel adapter errors (send failure, disconnected adapter).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An external collaborator call exceeded its bounded timeout.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TollgateError {
    /// Shorthand for the `Denied` variant.
    pub fn denied(reason: RejectReason) -> Self {
        TollgateError::Denied { reason }
    }

    /// True if the error is transient and the caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TollgateError::Storage { .. } | TollgateError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_carries_machine_readable_reason() {
        let err = TollgateError::denied(RejectReason::RateLimited);
        assert_eq!(err.to_string(), "denied: rate_limited");
    }

    #[test]
    fn storage_is_transient_denied_is_not() {
        let storage = TollgateError::Storage {
            source: Box::new(std::io::Error::other("db locked")),
        };
        assert!(storage.is_transient());
        assert!(!TollgateError::denied(RejectReason::PermissionDenied).is_transient());
    }

    #[test]
    fn not_found_formats_kind_and_name() {
        let err = TollgateError::NotFound {
            kind: "role",
            name: "moderator".into(),
        };
        assert_eq!(err.to_string(), "role not found: moderator");
    }
}
