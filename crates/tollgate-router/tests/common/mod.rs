// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared router test harness: in-memory database, real limiter and
//! permission engine, mock collaborators.

use std::sync::Arc;

use tollgate_audit::AuditLedger;
use tollgate_config::{GatewayConfig, RateLimitConfig};
use tollgate_permissions::PermissionEngine;
use tollgate_ratelimit::RateLimiter;
use tollgate_router::MessageRouter;
use tollgate_storage::Database;
use tollgate_test_utils::{MemoryIdentityStore, MockSanitizer};

pub struct TestGateway {
    pub router: MessageRouter,
    pub store: Arc<MemoryIdentityStore>,
    pub ledger: AuditLedger,
    pub limiter: Arc<RateLimiter>,
    pub permissions: Arc<PermissionEngine>,
}

pub async fn gateway() -> TestGateway {
    gateway_with(GatewayConfig::default(), RateLimitConfig::default()).await
}

pub async fn gateway_with(
    gateway_config: GatewayConfig,
    rate_config: RateLimitConfig,
) -> TestGateway {
    let db = Database::open_in_memory().await.unwrap();
    let ledger = AuditLedger::new(db.clone());
    let limiter = Arc::new(RateLimiter::new(db.clone(), rate_config, ledger.clone()));
    let permissions = Arc::new(PermissionEngine::new(db, ledger.clone()).await.unwrap());
    let store = Arc::new(MemoryIdentityStore::new());

    let router = MessageRouter::new(
        gateway_config,
        Arc::new(MockSanitizer::new()),
        store.clone(),
        limiter.clone(),
        permissions.clone(),
        ledger.clone(),
    );
    TestGateway {
        router,
        store,
        ledger,
        limiter,
        permissions,
    }
}

impl TestGateway {
    /// Pair a user on a channel and grant the member role, enough to
    /// pass the whole pipeline.
    pub async fn pair_member(&self, user_id: &str, channel: &str, channel_user_id: &str) {
        self.store.pair(user_id, channel, channel_user_id);
        self.permissions
            .grant_role(user_id, "member", "test", None)
            .await
            .unwrap();
    }
}
