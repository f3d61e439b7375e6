// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit ledger.
//!
//! Every security decision in the gateway lands here. Rows are immutable:
//! the only mutation paths are `log_event` (insert) and
//! `cleanup_old_events` (the sole sanctioned deletion path, retention
//! sweep). Event types and statuses are closed enums; unknown values are
//! rejected before insert, never coerced.

use std::str::FromStr;

use rusqlite::params;
use serde::Serialize;
use tracing::{info, warn};

use tollgate_core::TollgateError;
use tollgate_core::types::{AuditEvent, AuditEventType, AuditStatus, now_iso};
use tollgate_storage::Database;

use crate::window::parse_since;

/// An event about to be appended. The ledger assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
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

impl NewAuditEvent {
    pub fn new(event_type: AuditEventType, action: &str, status: AuditStatus) -> Self {
        Self {
            event_type,
            user_id: None,
            session_id: None,
            channel: None,
            action: action.to_string(),
            resource: None,
            status,
            details: serde_json::Map::new(),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn channel(mut self, channel: &str) -> Self {
        self.channel = Some(channel.to_string());
        self
    }

    pub fn resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_string());
        self
    }

    pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Filters for `query_events` and `export_events`. All fields are ANDed.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<AuditEventType>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub channel: Option<String>,
    pub status: Option<AuditStatus>,
    /// Relative window (`"24h"`, `"7d"`, `"2w"`) or RFC-3339 timestamp.
    pub since: Option<String>,
}

/// One page of events plus the unpaginated match count.
#[derive(Debug, Clone, Serialize)]
pub struct EventPage {
    pub events: Vec<AuditEvent>,
    pub total: u64,
}

/// Aggregate ledger statistics.
#[derive(Debug, Clone, Serialize)]
pub struct AuditStats {
    pub total: u64,
    pub last_24h: u64,
    pub failures_last_24h: u64,
    pub by_type: Vec<(String, u64)>,
    pub by_status: Vec<(String, u64)>,
    pub top_actors: Vec<(String, u64)>,
}

fn event_from_row(row: &rusqlite::Row<'_>) -> Result<AuditEvent, rusqlite::Error> {
    let event_type: String = row.get(2)?;
    let status: String = row.get(8)?;
    let details: Option<String> = row.get(9)?;
    Ok(AuditEvent {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        event_type: AuditEventType::from_str(&event_type).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown event_type {event_type:?}").into(),
            )
        })?,
        user_id: row.get(3)?,
        session_id: row.get(4)?,
        channel: row.get(5)?,
        action: row.get(6)?,
        resource: row.get(7)?,
        status: AuditStatus::from_str(&status).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                format!("unknown status {status:?}").into(),
            )
        })?,
        details: details
            .and_then(|d| serde_json::from_str(&d).ok())
            .unwrap_or_default(),
        ip_address: row.get(10)?,
        user_agent: row.get(11)?,
    })
}

const EVENT_COLUMNS: &str = "id, timestamp, event_type, user_id, session_id, channel, \
                             action, resource, status, details, ip_address, user_agent";

/// Append-only ledger backed by the shared SQLite database.
#[derive(Clone)]
pub struct AuditLedger {
    db: Database,
}

impl AuditLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append an event. Returns the monotonic id the ledger assigned.
    pub async fn log_event(&self, event: &NewAuditEvent) -> Result<i64, TollgateError> {
        let event = event.clone();
        let timestamp = now_iso();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO audit_events
                         (timestamp, event_type, user_id, session_id, channel, action,
                          resource, status, details, ip_address, user_agent)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        timestamp,
                        event.event_type.to_string(),
                        event.user_id,
                        event.session_id,
                        event.channel,
                        event.action,
                        event.resource,
                        event.status.to_string(),
                        serde_json::Value::Object(event.details).to_string(),
                        event.ip_address,
                        event.user_agent,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(tollgate_storage::map_tr_err)
    }

    /// Append an event described by untyped strings, as received from a
    /// CLI or API surface. Unknown event types or statuses are rejected
    /// with a validation error before anything touches the database.
    pub async fn log_event_raw(
        &self,
        event_type: &str,
        action: &str,
        status: &str,
    ) -> Result<i64, TollgateError> {
        let event_type = AuditEventType::from_str(event_type)
            .map_err(|_| TollgateError::Validation(format!("unknown event type {event_type:?}")))?;
        let status = AuditStatus::from_str(status)
            .map_err(|_| TollgateError::Validation(format!("unknown status {status:?}")))?;
        self.log_event(&NewAuditEvent::new(event_type, action, status))
            .await
    }

    /// Fail-soft append: an audit-write failure must never block or fail
    /// the operation it describes, so errors degrade to a warning.
    pub async fn log_event_soft(&self, event: &NewAuditEvent) {
        if let Err(e) = self.log_event(event).await {
            warn!(
                event_type = %event.event_type,
                action = %event.action,
                error = %e,
                "audit write failed; continuing"
            );
        }
    }

    /// Query events matching `filter`, newest first. `total` counts every
    /// match regardless of `limit`/`offset`, for pagination.
    pub async fn query_events(
        &self,
        filter: &EventFilter,
        limit: u64,
        offset: u64,
    ) -> Result<EventPage, TollgateError> {
        let (where_clause, args) = build_where(filter)?;
        self.db
            .connection()
            .call(move |conn| {
                let total: u64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM audit_events {where_clause}"),
                    rusqlite::params_from_iter(args.iter()),
                    |row| row.get(0),
                )?;

                let sql = format!(
                    "SELECT {EVENT_COLUMNS} FROM audit_events {where_clause}
                     ORDER BY id DESC LIMIT {limit} OFFSET {offset}"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows =
                    stmt.query_map(rusqlite::params_from_iter(args.iter()), event_from_row)?;
                let mut events = Vec::new();
                for row in rows {
                    events.push(row?);
                }
                Ok(EventPage { events, total })
            })
            .await
            .map_err(tollgate_storage::map_tr_err)
    }

    /// Aggregate counts over the whole ledger.
    pub async fn get_stats(&self) -> Result<AuditStats, TollgateError> {
        let day_ago = (chrono::Utc::now() - chrono::Duration::hours(24))
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        self.db
            .connection()
            .call(move |conn| {
                let total: u64 =
                    conn.query_row("SELECT COUNT(*) FROM audit_events", [], |row| row.get(0))?;
                let last_24h: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM audit_events WHERE timestamp >= ?1",
                    params![day_ago],
                    |row| row.get(0),
                )?;
                let failures_last_24h: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM audit_events
                     WHERE timestamp >= ?1 AND status IN ('failure', 'blocked')",
                    params![day_ago],
                    |row| row.get(0),
                )?;

                let group = |conn: &rusqlite::Connection,
                             sql: &str|
                 -> Result<Vec<(String, u64)>, rusqlite::Error> {
                    let mut stmt = conn.prepare(sql)?;
                    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                    let mut out = Vec::new();
                    for row in rows {
                        out.push(row?);
                    }
                    Ok(out)
                };

                let by_type = group(
                    conn,
                    "SELECT event_type, COUNT(*) FROM audit_events
                     GROUP BY event_type ORDER BY COUNT(*) DESC",
                )?;
                let by_status = group(
                    conn,
                    "SELECT status, COUNT(*) FROM audit_events
                     GROUP BY status ORDER BY COUNT(*) DESC",
                )?;
                let top_actors = group(
                    conn,
                    "SELECT user_id, COUNT(*) FROM audit_events
                     WHERE user_id IS NOT NULL
                     GROUP BY user_id ORDER BY COUNT(*) DESC LIMIT 10",
                )?;

                Ok(AuditStats {
                    total,
                    last_24h,
                    failures_last_24h,
                    by_type,
                    by_status,
                    top_actors,
                })
            })
            .await
            .map_err(tollgate_storage::map_tr_err)
    }

    /// Delete events older than `retention_days`. The sole deletion path.
    ///
    /// With `dry_run` the would-be-deleted count is reported and nothing
    /// mutates. A real sweep appends an `audit_cleanup` event describing
    /// itself.
    pub async fn cleanup_old_events(
        &self,
        retention_days: u32,
        dry_run: bool,
    ) -> Result<u64, TollgateError> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(i64::from(retention_days)))
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();

        let affected: u64 = self
            .db
            .connection()
            .call(move |conn| -> Result<u64, rusqlite::Error> {
                if dry_run {
                    conn.query_row(
                        "SELECT COUNT(*) FROM audit_events WHERE timestamp < ?1",
                        params![cutoff],
                        |row| row.get(0),
                    )
                } else {
                    let deleted = conn.execute(
                        "DELETE FROM audit_events WHERE timestamp < ?1",
                        params![cutoff],
                    )?;
                    Ok(deleted as u64)
                }
            })
            .await
            .map_err(tollgate_storage::map_tr_err)?;

        if dry_run {
            info!(retention_days, affected, "audit cleanup dry run");
        } else {
            info!(retention_days, deleted = affected, "audit cleanup");
            self.log_event_soft(
                &NewAuditEvent::new(
                    AuditEventType::AuditCleanup,
                    "cleanup_old_events",
                    AuditStatus::Success,
                )
                .detail("retention_days", retention_days)
                .detail("deleted", affected),
            )
            .await;
        }
        Ok(affected)
    }
}

/// Build the WHERE clause and its positional string arguments.
fn build_where(filter: &EventFilter) -> Result<(String, Vec<String>), TollgateError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<String> = Vec::new();

    if let Some(event_type) = filter.event_type {
        args.push(event_type.to_string());
        clauses.push(format!("event_type = ?{}", args.len()));
    }
    if let Some(ref user_id) = filter.user_id {
        args.push(user_id.clone());
        clauses.push(format!("user_id = ?{}", args.len()));
    }
    if let Some(ref session_id) = filter.session_id {
        args.push(session_id.clone());
        clauses.push(format!("session_id = ?{}", args.len()));
    }
    if let Some(ref channel) = filter.channel {
        args.push(channel.clone());
        clauses.push(format!("channel = ?{}", args.len()));
    }
    if let Some(status) = filter.status {
        args.push(status.to_string());
        clauses.push(format!("status = ?{}", args.len()));
    }
    if let Some(ref since) = filter.since {
        let cutoff = parse_since(since)?;
        args.push(cutoff.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string());
        clauses.push(format!("timestamp >= ?{}", args.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    Ok((where_clause, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_ledger() -> AuditLedger {
        AuditLedger::new(Database::open_in_memory().await.unwrap())
    }

    fn inbound_ok(user: &str, channel: &str) -> NewAuditEvent {
        NewAuditEvent::new(
            AuditEventType::MessageInbound,
            "route_inbound",
            AuditStatus::Success,
        )
        .user(user)
        .channel(channel)
    }

    #[tokio::test]
    async fn ids_are_monotonic() {
        let ledger = test_ledger().await;
        let a = ledger.log_event(&inbound_ok("u1", "cli")).await.unwrap();
        let b = ledger.log_event(&inbound_ok("u1", "cli")).await.unwrap();
        let c = ledger.log_event(&inbound_ok("u2", "api")).await.unwrap();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn raw_logging_rejects_unknown_enums() {
        let ledger = test_ledger().await;
        let bad_type = ledger
            .log_event_raw("coffee_break", "route_inbound", "success")
            .await;
        assert!(matches!(bad_type, Err(TollgateError::Validation(_))));

        let bad_status = ledger
            .log_event_raw("message_inbound", "route_inbound", "maybe")
            .await;
        assert!(matches!(bad_status, Err(TollgateError::Validation(_))));

        // Nothing was inserted by the rejected calls.
        let page = ledger
            .query_events(&EventFilter::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn filters_compose_and_total_ignores_pagination() {
        let ledger = test_ledger().await;
        for i in 0..5 {
            ledger
                .log_event(&inbound_ok(&format!("u{}", i % 2), "cli"))
                .await
                .unwrap();
        }
        ledger
            .log_event(&NewAuditEvent::new(
                AuditEventType::PermissionCheck,
                "chat:send",
                AuditStatus::Blocked,
            ))
            .await
            .unwrap();

        let filter = EventFilter {
            event_type: Some(AuditEventType::MessageInbound),
            user_id: Some("u0".to_string()),
            ..Default::default()
        };
        let page = ledger.query_events(&filter, 1, 0).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].user_id.as_deref(), Some("u0"));
    }

    #[tokio::test]
    async fn wider_window_is_a_superset_of_narrower() {
        let ledger = test_ledger().await;
        for _ in 0..4 {
            ledger.log_event(&inbound_ok("u1", "cli")).await.unwrap();
        }

        let wide = ledger
            .query_events(
                &EventFilter {
                    since: Some("24h".to_string()),
                    ..Default::default()
                },
                100,
                0,
            )
            .await
            .unwrap();
        let narrow = ledger
            .query_events(
                &EventFilter {
                    since: Some("1h".to_string()),
                    ..Default::default()
                },
                100,
                0,
            )
            .await
            .unwrap();

        assert!(wide.total >= narrow.total);
        let wide_ids: Vec<i64> = wide.events.iter().map(|e| e.id).collect();
        for event in &narrow.events {
            assert!(wide_ids.contains(&event.id));
        }
    }

    #[tokio::test]
    async fn stats_aggregate_counts() {
        let ledger = test_ledger().await;
        ledger.log_event(&inbound_ok("u1", "cli")).await.unwrap();
        ledger.log_event(&inbound_ok("u1", "cli")).await.unwrap();
        ledger
            .log_event(&NewAuditEvent::new(
                AuditEventType::RateLimitCheck,
                "consume",
                AuditStatus::Blocked,
            ))
            .await
            .unwrap();

        let stats = ledger.get_stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.last_24h, 3);
        assert_eq!(stats.failures_last_24h, 1);
        assert_eq!(stats.by_type[0].0, "message_inbound");
        assert_eq!(stats.by_type[0].1, 2);
        assert_eq!(stats.top_actors[0], ("u1".to_string(), 2));
    }

    #[tokio::test]
    async fn dry_run_cleanup_mutates_nothing() {
        let ledger = test_ledger().await;
        ledger.log_event(&inbound_ok("u1", "cli")).await.unwrap();

        // Fresh events are inside any sane retention window.
        let affected = ledger.cleanup_old_events(30, true).await.unwrap();
        assert_eq!(affected, 0);

        let page = ledger
            .query_events(&EventFilter::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn cleanup_deletes_only_expired_rows() {
        let ledger = test_ledger().await;
        let keep = ledger.log_event(&inbound_ok("u1", "cli")).await.unwrap();

        // Backdate one row past the retention cutoff.
        let old = ledger.log_event(&inbound_ok("u2", "cli")).await.unwrap();
        ledger
            .db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE audit_events SET timestamp = '2020-01-01T00:00:00.000Z' WHERE id = ?1",
                    params![old],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let deleted = ledger.cleanup_old_events(30, false).await.unwrap();
        assert_eq!(deleted, 1);

        let page = ledger
            .query_events(&EventFilter::default(), 10, 0)
            .await
            .unwrap();
        // The kept row plus the audit_cleanup event the sweep wrote.
        assert_eq!(page.total, 2);
        assert!(page.events.iter().any(|e| e.id == keep));
        assert!(
            page.events
                .iter()
                .any(|e| e.event_type == AuditEventType::AuditCleanup)
        );
    }

    #[tokio::test]
    async fn details_round_trip_as_json() {
        let ledger = test_ledger().await;
        ledger
            .log_event(
                &NewAuditEvent::new(
                    AuditEventType::RateLimitReset,
                    "reset",
                    AuditStatus::Success,
                )
                .user("admin-1")
                .detail("entity_type", "user")
                .detail("entity_id", "u7"),
            )
            .await
            .unwrap();

        let page = ledger
            .query_events(&EventFilter::default(), 1, 0)
            .await
            .unwrap();
        let event = &page.events[0];
        assert_eq!(event.details["entity_type"], "user");
        assert_eq!(event.details["entity_id"], "u7");
    }
}
