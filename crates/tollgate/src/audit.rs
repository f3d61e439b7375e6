// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate audit` subcommands: export, cleanup, stats.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Subcommand;
use tracing::info;

use tollgate_audit::{AuditLedger, EventFilter, ExportFormat};
use tollgate_config::TollgateConfig;
use tollgate_core::TollgateError;
use tollgate_core::types::{AuditEventType, AuditStatus};
use tollgate_storage::Database;

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Export filtered audit events as JSON or CSV.
    Export {
        /// Output format: json or csv.
        #[arg(long, default_value = "json")]
        format: String,
        /// Time window: relative ("24h", "7d", "2w") or RFC-3339.
        #[arg(long)]
        since: Option<String>,
        /// Filter by event type (e.g. message_inbound, permission_check).
        #[arg(long)]
        event_type: Option<String>,
        /// Filter by user id.
        #[arg(long)]
        user: Option<String>,
        /// Filter by channel name.
        #[arg(long)]
        channel: Option<String>,
        /// Filter by status: success, failure, or blocked.
        #[arg(long)]
        status: Option<String>,
        /// Maximum rows (defaults to the configured export limit).
        #[arg(long)]
        limit: Option<u64>,
        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Delete events older than the retention window.
    Cleanup {
        /// Retention in days (defaults to the configured value).
        #[arg(long)]
        retention_days: Option<u32>,
        /// Report what would be deleted without mutating.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print aggregate ledger statistics.
    Stats,
}

fn build_filter(
    since: Option<String>,
    event_type: Option<String>,
    user: Option<String>,
    channel: Option<String>,
    status: Option<String>,
) -> Result<EventFilter, TollgateError> {
    let event_type = event_type
        .map(|s| {
            AuditEventType::from_str(&s).map_err(|_| {
                TollgateError::Validation(format!("unknown event type {s:?}"))
            })
        })
        .transpose()?;
    let status = status
        .map(|s| {
            AuditStatus::from_str(&s)
                .map_err(|_| TollgateError::Validation(format!("unknown status {s:?}")))
        })
        .transpose()?;
    Ok(EventFilter {
        event_type,
        user_id: user,
        session_id: None,
        channel,
        status,
        since,
    })
}

pub async fn run(config: TollgateConfig, command: AuditCommand) -> Result<(), TollgateError> {
    let db = Database::open_with(&config.storage).await?;
    let ledger = AuditLedger::new(db.clone());

    match command {
        AuditCommand::Export {
            format,
            since,
            event_type,
            user,
            channel,
            status,
            limit,
            output,
        } => {
            let format = ExportFormat::from_str(&format)?;
            let filter = build_filter(since, event_type, user, channel, status)?;
            let limit = limit.unwrap_or(config.audit.export_limit);
            let rendered = ledger.export_events(&filter, format, limit).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered).map_err(|e| {
                        TollgateError::Internal(format!("write {}: {e}", path.display()))
                    })?;
                    info!(path = %path.display(), "audit export written");
                }
                None => println!("{rendered}"),
            }
        }
        AuditCommand::Cleanup {
            retention_days,
            dry_run,
        } => {
            let retention = retention_days.unwrap_or(config.audit.retention_days);
            let deleted = ledger.cleanup_old_events(retention, dry_run).await?;
            if dry_run {
                println!("{deleted} events older than {retention} days would be deleted");
            } else {
                println!("{deleted} events deleted (retention {retention} days)");
            }
        }
        AuditCommand::Stats => {
            let stats = ledger.get_stats().await?;
            let rendered = serde_json::to_string_pretty(&stats)
                .map_err(|e| TollgateError::Internal(format!("stats serialization: {e}")))?;
            println!("{rendered}");
        }
    }

    db.close().await
}
