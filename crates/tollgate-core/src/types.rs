// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Tollgate trust boundary.
//!
//! Closed enums derive strum `Display`/`EnumString` with snake_case wire
//! forms so they round-trip through TEXT columns and audit detail maps
//! without hand-written conversion tables.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// ISO-8601 UTC timestamp with millisecond precision, the storage wire form.
pub fn now_iso() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Direction of a message relative to the gateway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Machine-readable reason a message was rejected by the security pipeline.
///
/// Adapters map these to user-facing copy; the core never formats strings
/// for end users.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    ContentBlocked,
    UserNotPaired,
    RateLimited,
    PermissionDenied,
}

/// Rate-limited entity scope. Each scope has independent token and cost
/// accounting, giving three independent ceilings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    User,
    Channel,
    Global,
}

/// Closed set of audit event types. `log_event` rejects anything that does
/// not parse into this enum rather than coercing it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    MessageInbound,
    MessageOutbound,
    Broadcast,
    RateLimitCheck,
    RateLimitReset,
    PermissionCheck,
    RoleGranted,
    RoleRevoked,
    RoleCreated,
    RoleDeleted,
    AuditCleanup,
}

/// Outcome recorded with every audit event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Failure,
    Blocked,
}

/// Delivery priority for broadcast messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BroadcastPriority {
    Low,
    Normal,
    High,
}

/// A file or media attachment carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub url: String,
}

/// The channel-agnostic message representation.
///
/// Created by an adapter, mutated by the security pipeline (sanitized
/// content, resolved `user_id`), and handed to the Identity Store for
/// persistence. The router itself retains nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedMessage {
    /// Gateway-assigned unique id (UUID v4).
    pub id: String,
    /// Name of the channel adapter this message belongs to.
    pub channel: String,
    /// Platform-native message id, if the channel provides one.
    pub channel_message_id: Option<String>,
    /// Platform-native sender id.
    pub channel_user_id: String,
    /// Internal user id, `None` until the identity stage resolves it.
    pub user_id: Option<String>,
    pub direction: Direction,
    pub content: String,
    pub content_type: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<String>,
    /// ISO-8601 UTC timestamp.
    pub timestamp: String,
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl UnifiedMessage {
    /// Build an inbound text message as a channel adapter would.
    pub fn inbound(channel: &str, channel_user_id: &str, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            channel_message_id: None,
            channel_user_id: channel_user_id.to_string(),
            user_id: None,
            direction: Direction::Inbound,
            content: content.to_string(),
            content_type: "text/plain".to_string(),
            attachments: Vec::new(),
            reply_to: None,
            timestamp: now_iso(),
            session_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Build an outbound text message addressed to a resolved user.
    pub fn outbound(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            channel_message_id: None,
            channel_user_id: String::new(),
            user_id: Some(user_id.to_string()),
            direction: Direction::Outbound,
            content: content.to_string(),
            content_type: "text/plain".to_string(),
            attachments: Vec::new(),
            reply_to: None,
            timestamp: now_iso(),
            session_id: None,
            metadata: serde_json::Map::new(),
        }
    }
}

/// A channel-specific identity, possibly paired to an internal account.
///
/// Unpaired identities exist so repeat senders are recognizable, but they
/// are denied everything beyond the pairing flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub channel: String,
    pub channel_user_id: String,
    pub display_name: Option<String>,
    pub paired: bool,
    pub preferred_channel: Option<String>,
}

impl Identity {
    /// Create an unpaired placeholder for a first-time sender.
    pub fn unpaired(channel: &str, channel_user_id: &str) -> Self {
        Self {
            user_id: uuid::Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            channel_user_id: channel_user_id.to_string(),
            display_name: None,
            paired: false,
            preferred_channel: None,
        }
    }
}

/// Result of a channel adapter send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub success: bool,
    pub message_id: Option<String>,
}

/// Sanitizer recommendation for a piece of inbound content.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Allow,
    Block,
    Escalate,
}

/// Verdict returned by the external sanitizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeVerdict {
    pub sanitized_text: String,
    pub recommendation: Recommendation,
}

/// A named permission role. Permission strings follow the
/// `resource:action` grammar where either segment may be `*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
    /// Higher priority means more privileged; used to order permission
    /// resolution, never to override an explicit grant.
    pub priority: i64,
    /// System roles ship pre-seeded and cannot be deleted.
    pub is_system: bool,
}

/// A role granted to a user. Unique per (user_id, role_name) pair:
/// re-granting updates the metadata instead of duplicating the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub user_id: String,
    pub role_name: String,
    pub granted_at: String,
    pub granted_by: String,
    pub expires_at: Option<String>,
}

/// Persistent token-bucket state for one rate-limited entity.
///
/// `tokens` is real-valued and bounded to `[0, max_tokens]`; the cost
/// counters never go negative and reset lazily at their window boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBucket {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub tokens: f64,
    pub last_refill: String,
    pub hour_cost: f64,
    pub hour_reset: String,
    pub day_cost: f64,
    pub day_reset: String,
    pub lifetime_tokens: f64,
    pub lifetime_cost: f64,
}

/// An immutable audit ledger row. Never updated; deleted only by the
/// explicit retention sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Monotonic id assigned by the ledger.
    pub id: i64,
    pub timestamp: String,
    pub event_type: AuditEventType,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub channel: Option<String>,
    pub action: String,
    pub resource: Option<String>,
    pub status: AuditStatus,
    pub details: serde_json::Map<String, serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
