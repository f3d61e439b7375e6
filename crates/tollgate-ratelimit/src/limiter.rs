// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-backed rate limiter.
//!
//! `check` is side-effect-free; `consume` re-validates and applies the
//! whole read-modify-write inside one transaction on the single-writer
//! connection, so concurrent consumers on the same entity never lose
//! updates. Buckets are created at full capacity on first reference.
//!
//! Storage failures deny by default (fail-closed); deployments opt into
//! fail-open explicitly via `rate_limit.fail_open`.

use rusqlite::params;
use serde::Serialize;
use tracing::{debug, warn};

use tollgate_audit::{AuditLedger, NewAuditEvent};
use tollgate_config::{EntityLimits, RateLimitConfig};
use tollgate_core::TollgateError;
use tollgate_core::types::{AuditEventType, AuditStatus, EntityType, RateBucket};
use tollgate_storage::Database;

use crate::bucket::{self, RateDecision};

/// Lifetime accounting for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateStats {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub lifetime_tokens: f64,
    pub lifetime_cost: f64,
}

const SELECT_BUCKET: &str = "SELECT entity_type, entity_id, tokens, last_refill, hour_cost, \
                             hour_reset, day_cost, day_reset, lifetime_tokens, lifetime_cost \
                             FROM rate_buckets WHERE entity_type = ?1 AND entity_id = ?2";

const UPSERT_BUCKET: &str = "INSERT OR REPLACE INTO rate_buckets \
                             (entity_type, entity_id, tokens, last_refill, hour_cost, \
                              hour_reset, day_cost, day_reset, lifetime_tokens, lifetime_cost) \
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

fn bucket_from_row(row: &rusqlite::Row<'_>) -> Result<RateBucket, rusqlite::Error> {
    use std::str::FromStr;
    let entity_type: String = row.get(0)?;
    Ok(RateBucket {
        entity_type: EntityType::from_str(&entity_type).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown entity_type {entity_type:?}").into(),
            )
        })?,
        entity_id: row.get(1)?,
        tokens: row.get(2)?,
        last_refill: row.get(3)?,
        hour_cost: row.get(4)?,
        hour_reset: row.get(5)?,
        day_cost: row.get(6)?,
        day_reset: row.get(7)?,
        lifetime_tokens: row.get(8)?,
        lifetime_cost: row.get(9)?,
    })
}

fn write_bucket(conn: &rusqlite::Connection, b: &RateBucket) -> Result<(), rusqlite::Error> {
    conn.execute(
        UPSERT_BUCKET,
        params![
            b.entity_type.to_string(),
            b.entity_id,
            b.tokens,
            b.last_refill,
            b.hour_cost,
            b.hour_reset,
            b.day_cost,
            b.day_reset,
            b.lifetime_tokens,
            b.lifetime_cost,
        ],
    )?;
    Ok(())
}

/// Admission control: token bucket plus hourly and daily spending caps,
/// one independent ceiling per (entity_type, entity_id).
pub struct RateLimiter {
    db: Database,
    config: RateLimitConfig,
    ledger: AuditLedger,
}

impl RateLimiter {
    pub fn new(db: Database, config: RateLimitConfig, ledger: AuditLedger) -> Self {
        Self { db, config, ledger }
    }

    fn limits_for(&self, entity_type: EntityType) -> &EntityLimits {
        match entity_type {
            EntityType::User => &self.config.user,
            EntityType::Channel => &self.config.channel,
            EntityType::Global => &self.config.global,
        }
    }

    async fn load_bucket(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<RateBucket>, TollgateError> {
        let et = entity_type.to_string();
        let id = entity_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(SELECT_BUCKET)?;
                let mut rows = stmt.query_map(params![et, id], bucket_from_row)?;
                rows.next().transpose()
            })
            .await
            .map_err(tollgate_storage::map_tr_err)
    }

    /// Apply the fail-open/fail-closed policy to a storage failure.
    fn storage_failure(
        &self,
        entity_type: EntityType,
        err: TollgateError,
    ) -> Result<RateDecision, TollgateError> {
        if self.config.fail_open {
            warn!(
                entity_type = %entity_type,
                error = %err,
                "rate limiter storage failure, fail-open admits the request"
            );
            Ok(RateDecision::allow(self.limits_for(entity_type).max_tokens))
        } else {
            Err(err)
        }
    }

    /// Side-effect-free admission test. Refills mathematically, then tests
    /// token sufficiency, the hour cap, and the day cap, in that order.
    /// Repeated calls without `consume` never change bucket state.
    pub async fn check(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        tokens: f64,
        cost: f64,
    ) -> Result<RateDecision, TollgateError> {
        let limits = self.limits_for(entity_type);
        let now = chrono::Utc::now();
        let stored = match self.load_bucket(entity_type, entity_id).await {
            Ok(stored) => stored,
            Err(e) => return self.storage_failure(entity_type, e),
        };
        let bucket =
            stored.unwrap_or_else(|| bucket::new_bucket(entity_type, entity_id, limits, now));
        Ok(bucket::evaluate(&bucket, limits, now, tokens, cost))
    }

    /// Re-validate and, if allowed, atomically decrement tokens, advance
    /// the cost windows, and bump lifetime totals. The read-modify-write
    /// runs inside a single transaction on the single-writer connection.
    pub async fn consume(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        tokens: f64,
        cost: f64,
    ) -> Result<RateDecision, TollgateError> {
        let limits = self.limits_for(entity_type).clone();
        let et = entity_type.to_string();
        let id = entity_id.to_string();

        let result = self
            .db
            .connection()
            .call(move |conn| -> Result<RateDecision, rusqlite::Error> {
                let now = chrono::Utc::now();
                let tx = conn.transaction()?;

                let stored = {
                    let mut stmt = tx.prepare(SELECT_BUCKET)?;
                    let mut rows = stmt.query_map(params![et, id], bucket_from_row)?;
                    rows.next().transpose()?
                };
                let current = stored
                    .unwrap_or_else(|| bucket::new_bucket(entity_type, &id, &limits, now));

                let decision = bucket::evaluate(&current, &limits, now, tokens, cost);
                if decision.allowed {
                    let updated = bucket::apply(&current, &limits, now, tokens, cost);
                    write_bucket(&tx, &updated)?;
                }
                tx.commit()?;
                Ok(decision)
            })
            .await
            .map_err(tollgate_storage::map_tr_err);

        match result {
            Ok(decision) => {
                if !decision.allowed {
                    debug!(
                        entity_type = %entity_type,
                        entity_id,
                        reason = ?decision.reason,
                        "rate consume denied"
                    );
                }
                Ok(decision)
            }
            Err(e) => self.storage_failure(entity_type, e),
        }
    }

    /// Read-only view of a bucket: refilled tokens, lazily reset windows.
    pub async fn status(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<RateBucket, TollgateError> {
        let limits = self.limits_for(entity_type);
        let now = chrono::Utc::now();
        let bucket = self
            .load_bucket(entity_type, entity_id)
            .await?
            .unwrap_or_else(|| bucket::new_bucket(entity_type, entity_id, limits, now));
        let view = bucket::observed(&bucket, limits, now);

        self.ledger
            .log_event_soft(
                &NewAuditEvent::new(
                    AuditEventType::RateLimitCheck,
                    "status",
                    AuditStatus::Success,
                )
                .resource(&format!("{entity_type}:{entity_id}")),
            )
            .await;
        Ok(view)
    }

    /// Administrative override: restore full capacity and zero both cost
    /// windows. Lifetime totals are preserved.
    pub async fn reset(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        reset_by: &str,
    ) -> Result<(), TollgateError> {
        let limits = self.limits_for(entity_type).clone();
        let et = entity_type.to_string();
        let id = entity_id.to_string();

        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let now = chrono::Utc::now();
                let tx = conn.transaction()?;
                let stored = {
                    let mut stmt = tx.prepare(SELECT_BUCKET)?;
                    let mut rows = stmt.query_map(params![et, id], bucket_from_row)?;
                    rows.next().transpose()?
                };
                let mut fresh = bucket::new_bucket(entity_type, &id, &limits, now);
                if let Some(previous) = stored {
                    fresh.lifetime_tokens = previous.lifetime_tokens;
                    fresh.lifetime_cost = previous.lifetime_cost;
                }
                write_bucket(&tx, &fresh)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(tollgate_storage::map_tr_err)?;

        self.ledger
            .log_event_soft(
                &NewAuditEvent::new(
                    AuditEventType::RateLimitReset,
                    "reset",
                    AuditStatus::Success,
                )
                .user(reset_by)
                .resource(&format!("{entity_type}:{entity_id}")),
            )
            .await;
        Ok(())
    }

    /// Lifetime totals for an entity.
    pub async fn get_stats(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<RateStats, TollgateError> {
        let bucket = self.load_bucket(entity_type, entity_id).await?;
        let (lifetime_tokens, lifetime_cost) = bucket
            .map(|b| (b.lifetime_tokens, b.lifetime_cost))
            .unwrap_or((0.0, 0.0));

        self.ledger
            .log_event_soft(
                &NewAuditEvent::new(
                    AuditEventType::RateLimitCheck,
                    "get_stats",
                    AuditStatus::Success,
                )
                .resource(&format!("{entity_type}:{entity_id}")),
            )
            .await;

        Ok(RateStats {
            entity_type,
            entity_id: entity_id.to_string(),
            lifetime_tokens,
            lifetime_cost,
        })
    }
}
