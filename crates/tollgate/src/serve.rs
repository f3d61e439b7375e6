// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tollgate serve` command implementation.
//!
//! Opens the database, wires the audit ledger, rate limiter, permission
//! engine, and router together, then parks until shutdown. Channel
//! adapters and handlers are registered by the embedding application;
//! the standalone binary serves the trust boundary around an initially
//! empty registry.

use std::sync::Arc;

use tracing::info;

use tollgate_audit::AuditLedger;
use tollgate_config::TollgateConfig;
use tollgate_core::TollgateError;
use tollgate_permissions::PermissionEngine;
use tollgate_ratelimit::RateLimiter;
use tollgate_router::MessageRouter;
use tollgate_storage::{Database, SqliteIdentityStore};

pub async fn run(config: TollgateConfig) -> Result<(), TollgateError> {
    let db = Database::open_with(&config.storage).await?;
    let ledger = AuditLedger::new(db.clone());
    let limiter = Arc::new(RateLimiter::new(
        db.clone(),
        config.rate_limit.clone(),
        ledger.clone(),
    ));
    let permissions = Arc::new(PermissionEngine::new(db.clone(), ledger.clone()).await?);
    let identities = Arc::new(SqliteIdentityStore::new(db.clone()));

    let _router = MessageRouter::new(
        config.gateway.clone(),
        Arc::new(PassthroughSanitizer),
        identities,
        limiter,
        permissions,
        ledger,
    );

    info!(
        database = %config.storage.database_path,
        "tollgate gateway ready"
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| TollgateError::Internal(format!("signal handler: {e}")))?;
    info!("shutdown signal received");
    db.close().await?;
    Ok(())
}

/// Default sanitizer for the standalone binary: allows everything
/// unchanged. Deployments embed their own `Sanitizer` implementation.
struct PassthroughSanitizer;

#[async_trait::async_trait]
impl tollgate_core::traits::Sanitizer for PassthroughSanitizer {
    async fn sanitize(
        &self,
        text: &str,
    ) -> Result<tollgate_core::types::SanitizeVerdict, TollgateError> {
        Ok(tollgate_core::types::SanitizeVerdict {
            sanitized_text: text.to_string(),
            recommendation: tollgate_core::types::Recommendation::Allow,
        })
    }
}
