// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit export as a structured document (JSON) or flat tabular text (CSV).

use std::str::FromStr;

use tollgate_core::TollgateError;
use tollgate_core::types::AuditEvent;

use crate::ledger::{AuditLedger, EventFilter};

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = TollgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(TollgateError::Validation(format!(
                "unknown export format {other:?}: expected json or csv"
            ))),
        }
    }
}

impl AuditLedger {
    /// Serialize the filtered event set, capped at `limit` rows.
    pub async fn export_events(
        &self,
        filter: &EventFilter,
        format: ExportFormat,
        limit: u64,
    ) -> Result<String, TollgateError> {
        let page = self.query_events(filter, limit, 0).await?;
        match format {
            ExportFormat::Json => serde_json::to_string_pretty(&page.events)
                .map_err(|e| TollgateError::Internal(format!("json export failed: {e}"))),
            ExportFormat::Csv => to_csv(&page.events),
        }
    }
}

fn to_csv(events: &[AuditEvent]) -> Result<String, TollgateError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "id",
            "timestamp",
            "event_type",
            "user_id",
            "session_id",
            "channel",
            "action",
            "resource",
            "status",
            "details",
            "ip_address",
            "user_agent",
        ])
        .map_err(csv_err)?;

    for event in events {
        writer
            .write_record([
                event.id.to_string(),
                event.timestamp.clone(),
                event.event_type.to_string(),
                event.user_id.clone().unwrap_or_default(),
                event.session_id.clone().unwrap_or_default(),
                event.channel.clone().unwrap_or_default(),
                event.action.clone(),
                event.resource.clone().unwrap_or_default(),
                event.status.to_string(),
                serde_json::Value::Object(event.details.clone()).to_string(),
                event.ip_address.clone().unwrap_or_default(),
                event.user_agent.clone().unwrap_or_default(),
            ])
            .map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| TollgateError::Internal(format!("csv export failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| TollgateError::Internal(format!("csv export: {e}")))
}

fn csv_err(e: csv::Error) -> TollgateError {
    TollgateError::Internal(format!("csv export failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::NewAuditEvent;
    use tollgate_core::types::{AuditEventType, AuditStatus};
    use tollgate_storage::Database;

    async fn seeded_ledger() -> AuditLedger {
        let ledger = AuditLedger::new(Database::open_in_memory().await.unwrap());
        ledger
            .log_event(
                &NewAuditEvent::new(
                    AuditEventType::MessageInbound,
                    "route_inbound",
                    AuditStatus::Success,
                )
                .user("u1")
                .channel("cli")
                .detail("reason", "ok"),
            )
            .await
            .unwrap();
        ledger
            .log_event(&NewAuditEvent::new(
                AuditEventType::PermissionCheck,
                "chat:send",
                AuditStatus::Blocked,
            ))
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn json_export_is_parseable() {
        let ledger = seeded_ledger().await;
        let out = ledger
            .export_events(&EventFilter::default(), ExportFormat::Json, 100)
            .await
            .unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn csv_export_has_header_and_rows() {
        let ledger = seeded_ledger().await;
        let out = ledger
            .export_events(&EventFilter::default(), ExportFormat::Csv, 100)
            .await
            .unwrap();
        let lines: Vec<&str> = out.trim().lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,timestamp,event_type"));
        assert!(out.contains("permission_check"));
    }

    #[tokio::test]
    async fn export_respects_filter() {
        let ledger = seeded_ledger().await;
        let filter = EventFilter {
            status: Some(AuditStatus::Blocked),
            ..Default::default()
        };
        let out = ledger
            .export_events(&filter, ExportFormat::Json, 100)
            .await
            .unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["status"], "blocked");
    }

    #[test]
    fn format_parses_from_cli_input() {
        assert_eq!(ExportFormat::from_str("json").unwrap(), ExportFormat::Json);
        assert_eq!(ExportFormat::from_str("csv").unwrap(), ExportFormat::Csv);
        assert!(ExportFormat::from_str("xml").is_err());
    }
}
