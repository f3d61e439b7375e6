// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tollgate gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup instead of silently ignoring them.

use serde::{Deserialize, Serialize};

/// Top-level Tollgate configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TollgateConfig {
    /// Router and pipeline settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Rate limiter ceilings per entity scope.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Audit ledger settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Router and security pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Bounded timeout for external pipeline calls (sanitizer, identity
    /// store), in milliseconds. On timeout the stage fails closed.
    #[serde(default = "default_pipeline_timeout_ms")]
    pub pipeline_timeout_ms: u64,

    /// When true, a permission-engine storage failure admits the message
    /// instead of denying it. Denial is the default.
    #[serde(default)]
    pub permission_fail_open: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            pipeline_timeout_ms: default_pipeline_timeout_ms(),
            permission_fail_open: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pipeline_timeout_ms() -> u64 {
    5_000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    "tollgate.db".to_string()
}

fn default_true() -> bool {
    true
}

/// Token and cost ceilings for one rate-limited entity scope.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EntityLimits {
    /// Bucket capacity; buckets are created full.
    pub max_tokens: f64,
    /// Continuous refill rate.
    pub tokens_per_minute: f64,
    /// Cost cap for the rolling hour window.
    pub hourly_cost_cap: f64,
    /// Cost cap for the rolling day window.
    pub daily_cost_cap: f64,
}

/// Rate limiter configuration. Global, per-channel, and per-user ceilings
/// are independent; a message must clear all three.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_user_limits")]
    pub user: EntityLimits,

    #[serde(default = "default_channel_limits")]
    pub channel: EntityLimits,

    #[serde(default = "default_global_limits")]
    pub global: EntityLimits,

    /// When true, a rate-limiter storage failure admits the request
    /// instead of denying it. Denial is the default.
    #[serde(default)]
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            user: default_user_limits(),
            channel: default_channel_limits(),
            global: default_global_limits(),
            fail_open: false,
        }
    }
}

fn default_user_limits() -> EntityLimits {
    EntityLimits {
        max_tokens: 60.0,
        tokens_per_minute: 30.0,
        hourly_cost_cap: 100.0,
        daily_cost_cap: 500.0,
    }
}

fn default_channel_limits() -> EntityLimits {
    EntityLimits {
        max_tokens: 300.0,
        tokens_per_minute: 150.0,
        hourly_cost_cap: 500.0,
        daily_cost_cap: 2_000.0,
    }
}

fn default_global_limits() -> EntityLimits {
    EntityLimits {
        max_tokens: 3_000.0,
        tokens_per_minute: 1_500.0,
        hourly_cost_cap: 5_000.0,
        daily_cost_cap: 20_000.0,
    }
}

/// Audit ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Default retention window for `cleanup_old_events`, in days.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Hard cap on rows returned by a single export.
    #[serde(default = "default_export_limit")]
    pub export_limit: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            export_limit: default_export_limit(),
        }
    }
}

fn default_retention_days() -> u32 {
    90
}

fn default_export_limit() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_fail_closed() {
        let config = TollgateConfig::default();
        assert!(!config.rate_limit.fail_open);
        assert!(!config.gateway.permission_fail_open);
    }

    #[test]
    fn default_user_bucket_refills_half_capacity_per_minute() {
        let limits = default_user_limits();
        assert_eq!(limits.max_tokens, 60.0);
        assert_eq!(limits.tokens_per_minute, 30.0);
    }

    #[test]
    fn scopes_have_independent_ceilings() {
        let config = RateLimitConfig::default();
        assert!(config.global.max_tokens > config.channel.max_tokens);
        assert!(config.channel.max_tokens > config.user.max_tokens);
    }
}
