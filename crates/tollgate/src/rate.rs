// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate rate` subcommands: status, stats, reset.

use std::str::FromStr;

use clap::Subcommand;

use tollgate_audit::AuditLedger;
use tollgate_config::TollgateConfig;
use tollgate_core::TollgateError;
use tollgate_core::types::EntityType;
use tollgate_ratelimit::RateLimiter;
use tollgate_storage::Database;

#[derive(Subcommand, Debug)]
pub enum RateCommand {
    /// Show the current bucket for an entity (refilled, windows reset).
    Status {
        /// Entity scope: user, channel, or global.
        entity_type: String,
        /// Entity id ("global" for the global scope).
        entity_id: String,
    },
    /// Show lifetime token and cost totals for an entity.
    Stats {
        entity_type: String,
        entity_id: String,
    },
    /// Restore full capacity and zero the cost windows for an entity.
    Reset {
        entity_type: String,
        entity_id: String,
        /// Recorded in the audit trail as the resetting actor.
        #[arg(long, default_value = "cli")]
        by: String,
    },
}

fn parse_entity_type(s: &str) -> Result<EntityType, TollgateError> {
    EntityType::from_str(s).map_err(|_| {
        TollgateError::Validation(format!(
            "unknown entity type {s:?}: expected user, channel, or global"
        ))
    })
}

pub async fn run(config: TollgateConfig, command: RateCommand) -> Result<(), TollgateError> {
    let db = Database::open_with(&config.storage).await?;
    let ledger = AuditLedger::new(db.clone());
    let limiter = RateLimiter::new(db.clone(), config.rate_limit.clone(), ledger);

    match command {
        RateCommand::Status {
            entity_type,
            entity_id,
        } => {
            let entity_type = parse_entity_type(&entity_type)?;
            let bucket = limiter.status(entity_type, &entity_id).await?;
            let rendered = serde_json::to_string_pretty(&bucket)
                .map_err(|e| TollgateError::Internal(format!("status serialization: {e}")))?;
            println!("{rendered}");
        }
        RateCommand::Stats {
            entity_type,
            entity_id,
        } => {
            let entity_type = parse_entity_type(&entity_type)?;
            let stats = limiter.get_stats(entity_type, &entity_id).await?;
            let rendered = serde_json::to_string_pretty(&stats)
                .map_err(|e| TollgateError::Internal(format!("stats serialization: {e}")))?;
            println!("{rendered}");
        }
        RateCommand::Reset {
            entity_type,
            entity_id,
            by,
        } => {
            let entity_type = parse_entity_type(&entity_type)?;
            limiter.reset(entity_type, &entity_id, &by).await?;
            println!("{entity_type}:{entity_id} reset to full capacity");
        }
    }

    db.close().await
}
