// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured routing results.
//!
//! Pipeline failures never surface as errors to the routing caller:
//! every rejection is a `RouteOutcome` with a machine-readable reason
//! plus whatever diagnostic context the completed stages accumulated.

use serde::Serialize;

use tollgate_core::types::RejectReason;

/// Per-handler dispatch result. A failing handler never aborts siblings.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResult {
    pub handler: String,
    pub ok: bool,
    pub error: Option<String>,
}

/// Result of one `route_inbound` call.
#[derive(Debug, Clone, Serialize)]
pub struct RouteOutcome {
    pub allowed: bool,
    /// Machine-readable rejection reason. `None` with `allowed: false`
    /// means a transient infrastructure failure, not a security decision.
    pub reason: Option<RejectReason>,
    /// Accumulated stage diagnostics, returned even on failure.
    pub context: serde_json::Map<String, serde_json::Value>,
    pub handler_results: Vec<HandlerResult>,
}

impl RouteOutcome {
    pub fn accepted(
        context: serde_json::Map<String, serde_json::Value>,
        handler_results: Vec<HandlerResult>,
    ) -> Self {
        Self {
            allowed: true,
            reason: None,
            context,
            handler_results,
        }
    }

    pub fn rejected(
        reason: RejectReason,
        context: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            context,
            handler_results: Vec::new(),
        }
    }

    pub fn failed(context: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            allowed: false,
            reason: None,
            context,
            handler_results: Vec::new(),
        }
    }
}
