// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message router: single entry and exit point for chat traffic.
//!
//! `route_inbound` runs the security pipeline under the message's
//! channel lock, so messages on one channel are processed in strict
//! arrival order while other channels proceed with genuine overlap.
//! Pipeline stages short-circuit on first failure and fail closed:
//! a sanitizer timeout blocks the content, an identity failure reads as
//! unpaired, and rate/permission storage failures deny unless the
//! deployment opted into fail-open.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use tollgate_audit::{AuditLedger, NewAuditEvent};
use tollgate_config::GatewayConfig;
use tollgate_core::TollgateError;
use tollgate_core::traits::{ChannelAdapter, IdentityStore, MessageHandler, Sanitizer};
use tollgate_core::types::{
    AuditEventType, AuditStatus, BroadcastPriority, EntityType, Identity, Recommendation,
    RejectReason, SendReceipt, UnifiedMessage,
};
use tollgate_permissions::PermissionEngine;
use tollgate_ratelimit::RateLimiter;

use crate::locks::ChannelLocks;
use crate::outcome::{HandlerResult, RouteOutcome};

/// Entity id under which the single global rate bucket is keyed.
const GLOBAL_ENTITY_ID: &str = "global";

/// Permission required to pass the inbound pipeline.
const CHAT_SEND: &str = "chat:send";

pub struct MessageRouter {
    config: GatewayConfig,
    adapters: DashMap<String, Arc<dyn ChannelAdapter>>,
    handlers: RwLock<Vec<Arc<dyn MessageHandler>>>,
    locks: ChannelLocks,
    sanitizer: Arc<dyn Sanitizer>,
    identities: Arc<dyn IdentityStore>,
    limiter: Arc<RateLimiter>,
    permissions: Arc<PermissionEngine>,
    ledger: AuditLedger,
}

impl MessageRouter {
    pub fn new(
        config: GatewayConfig,
        sanitizer: Arc<dyn Sanitizer>,
        identities: Arc<dyn IdentityStore>,
        limiter: Arc<RateLimiter>,
        permissions: Arc<PermissionEngine>,
        ledger: AuditLedger,
    ) -> Self {
        Self {
            config,
            adapters: DashMap::new(),
            handlers: RwLock::new(Vec::new()),
            locks: ChannelLocks::new(),
            sanitizer,
            identities,
            limiter,
            permissions,
            ledger,
        }
    }

    /// Register an adapter under its own name. Names are unique.
    pub fn register_adapter(&self, adapter: Arc<dyn ChannelAdapter>) -> Result<(), TollgateError> {
        let name = adapter.name().to_string();
        match self.adapters.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(TollgateError::Validation(format!(
                "adapter {name:?} is already registered"
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(adapter);
                info!(adapter = %name, "adapter registered");
                Ok(())
            }
        }
    }

    pub fn unregister_adapter(&self, name: &str) -> Result<(), TollgateError> {
        match self.adapters.remove(name) {
            Some(_) => {
                info!(adapter = name, "adapter unregistered");
                Ok(())
            }
            None => Err(TollgateError::NotFound {
                kind: "adapter",
                name: name.to_string(),
            }),
        }
    }

    /// Append a handler to the dispatch list. Handlers run in
    /// registration order.
    pub async fn add_message_handler(&self, handler: Arc<dyn MessageHandler>) {
        let mut handlers = self.handlers.write().await;
        debug!(handler = handler.name(), "handler added");
        handlers.push(handler);
    }

    pub async fn remove_message_handler(&self, name: &str) -> Result<(), TollgateError> {
        let mut handlers = self.handlers.write().await;
        let before = handlers.len();
        handlers.retain(|h| h.name() != name);
        if handlers.len() == before {
            return Err(TollgateError::NotFound {
                kind: "handler",
                name: name.to_string(),
            });
        }
        debug!(handler = name, "handler removed");
        Ok(())
    }

    fn pipeline_timeout(&self) -> Duration {
        Duration::from_millis(self.config.pipeline_timeout_ms)
    }

    /// Bound an external collaborator call. Timeouts become
    /// `TollgateError::Timeout` so each stage can fail closed.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, TollgateError>>,
    ) -> Result<T, TollgateError> {
        let timeout = self.pipeline_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(TollgateError::Timeout { duration: timeout }),
        }
    }

    /// Run the inbound security pipeline and, on acceptance, persist the
    /// message and dispatch it to every handler.
    ///
    /// Never returns an error: every failure is a structured outcome with
    /// a machine-readable reason. Each call is audited, pass or fail.
    pub async fn route_inbound(&self, message: UnifiedMessage) -> RouteOutcome {
        let channel = message.channel.clone();
        let message_id = message.id.clone();

        let lock = self.locks.lock_for(&channel);
        let _guard = lock.lock().await;
        let outcome = self.inbound_locked(message).await;

        let status = if outcome.allowed {
            AuditStatus::Success
        } else if outcome.reason.is_some() {
            AuditStatus::Blocked
        } else {
            AuditStatus::Failure
        };
        let mut event = NewAuditEvent::new(AuditEventType::MessageInbound, "route_inbound", status)
            .channel(&channel)
            .resource(&message_id)
            .detail("context", Value::Object(outcome.context.clone()));
        if let Some(reason) = outcome.reason {
            event = event.detail("reason", reason.to_string());
        }
        if let Some(Value::String(user_id)) = outcome.context.get("user_id") {
            event = event.user(user_id);
        }
        self.ledger.log_event_soft(&event).await;
        outcome
    }

    async fn inbound_locked(&self, mut message: UnifiedMessage) -> RouteOutcome {
        let mut context = Map::new();

        // Stage 1: content sanitation. Block/escalate verdicts and
        // sanitizer failures all read as blocked content.
        match self.bounded(self.sanitizer.sanitize(&message.content)).await {
            Ok(verdict) => {
                context.insert(
                    "sanitize".to_string(),
                    json!(verdict.recommendation.to_string()),
                );
                match verdict.recommendation {
                    Recommendation::Allow => message.content = verdict.sanitized_text,
                    Recommendation::Block | Recommendation::Escalate => {
                        return RouteOutcome::rejected(RejectReason::ContentBlocked, context);
                    }
                }
            }
            Err(e) => {
                warn!(channel = %message.channel, error = %e, "sanitizer unavailable, blocking");
                context.insert("sanitize_error".to_string(), json!(e.to_string()));
                return RouteOutcome::rejected(RejectReason::ContentBlocked, context);
            }
        }

        // Stage 2: identity resolution. First-time senders get an
        // unpaired placeholder; store failures read as unpaired.
        let identity = match self
            .bounded(
                self.identities
                    .get_user_by_channel(&message.channel, &message.channel_user_id),
            )
            .await
        {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                let placeholder = Identity::unpaired(&message.channel, &message.channel_user_id);
                if let Err(e) = self
                    .bounded(self.identities.create_or_update_user(&placeholder))
                    .await
                {
                    warn!(channel = %message.channel, error = %e, "identity store unavailable");
                    context.insert("identity_error".to_string(), json!(e.to_string()));
                    return RouteOutcome::rejected(RejectReason::UserNotPaired, context);
                }
                placeholder
            }
            Err(e) => {
                warn!(channel = %message.channel, error = %e, "identity store unavailable");
                context.insert("identity_error".to_string(), json!(e.to_string()));
                return RouteOutcome::rejected(RejectReason::UserNotPaired, context);
            }
        };
        message.user_id = Some(identity.user_id.clone());
        context.insert("user_id".to_string(), json!(identity.user_id));
        context.insert("paired".to_string(), json!(identity.paired));

        // Stage 3: pairing gate.
        if !identity.paired {
            return RouteOutcome::rejected(RejectReason::UserNotPaired, context);
        }

        // Stage 4: rate admission across the three independent scopes.
        // All scopes are checked side-effect-free first, then consumed,
        // so a denial in a later scope never drains an earlier one.
        let scopes = [
            (EntityType::Global, GLOBAL_ENTITY_ID.to_string()),
            (EntityType::Channel, message.channel.clone()),
            (EntityType::User, identity.user_id.clone()),
        ];
        for (entity_type, entity_id) in &scopes {
            match self.limiter.check(*entity_type, entity_id, 1.0, 0.0).await {
                Ok(decision) if decision.allowed => {}
                Ok(decision) => {
                    context.insert("rate_scope".to_string(), json!(entity_type.to_string()));
                    if let Some(reason) = decision.reason {
                        context.insert("rate_reason".to_string(), json!(reason.to_string()));
                    }
                    if let Some(retry) = decision.retry_after_secs {
                        context.insert("retry_after_secs".to_string(), json!(retry));
                    }
                    return RouteOutcome::rejected(RejectReason::RateLimited, context);
                }
                Err(e) => {
                    warn!(scope = %entity_type, error = %e, "rate check failed closed");
                    context.insert("rate_error".to_string(), json!(e.to_string()));
                    return RouteOutcome::rejected(RejectReason::RateLimited, context);
                }
            }
        }
        for (entity_type, entity_id) in &scopes {
            match self.limiter.consume(*entity_type, entity_id, 1.0, 0.0).await {
                Ok(decision) if decision.allowed => {}
                Ok(_) | Err(_) => {
                    // Lost the race against a concurrent consumer, or the
                    // store failed mid-consume. Either way, deny.
                    context.insert("rate_scope".to_string(), json!(entity_type.to_string()));
                    return RouteOutcome::rejected(RejectReason::RateLimited, context);
                }
            }
        }
        context.insert("rate".to_string(), json!("allowed"));

        // Stage 5: permission check for chat:send.
        match self
            .permissions
            .check_permission(&identity.user_id, CHAT_SEND)
            .await
        {
            Ok(check) if check.allowed => {
                context.insert("permission".to_string(), json!("allowed"));
            }
            Ok(check) => {
                context.insert("permission".to_string(), json!("denied"));
                context.insert("user_permissions".to_string(), json!(check.user_permissions));
                return RouteOutcome::rejected(RejectReason::PermissionDenied, context);
            }
            Err(e) => {
                if self.config.permission_fail_open {
                    warn!(error = %e, "permission engine unavailable, fail-open admits");
                    context.insert("permission".to_string(), json!("fail_open"));
                } else {
                    warn!(error = %e, "permission engine unavailable, denying");
                    context.insert("permission_error".to_string(), json!(e.to_string()));
                    return RouteOutcome::rejected(RejectReason::PermissionDenied, context);
                }
            }
        }

        // Persist, then dispatch. A persistence failure is transient
        // infrastructure trouble, not a security rejection.
        if let Err(e) = self.bounded(self.identities.store_message(&message)).await {
            error!(message_id = %message.id, error = %e, "message persistence failed");
            context.insert("persist_error".to_string(), json!(e.to_string()));
            return RouteOutcome::failed(context);
        }

        let handlers: Vec<Arc<dyn MessageHandler>> = self.handlers.read().await.clone();
        let mut handler_results = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let result = handler.handle(&message).await;
            if let Err(ref e) = result {
                warn!(handler = handler.name(), error = %e, "handler failed");
            }
            handler_results.push(HandlerResult {
                handler: handler.name().to_string(),
                ok: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            });
        }

        RouteOutcome::accepted(context, handler_results)
    }

    /// Deliver an outbound message. An empty channel resolves to the
    /// user's preferred channel. Send, persist, and audit run regardless
    /// of one another's outcome.
    pub async fn route_outbound(
        &self,
        mut message: UnifiedMessage,
    ) -> Result<SendReceipt, TollgateError> {
        if message.channel.is_empty() {
            let user_id = message.user_id.clone().ok_or_else(|| {
                TollgateError::Validation(
                    "outbound message needs a channel or a user_id".to_string(),
                )
            })?;
            message.channel = self
                .identities
                .get_preferred_channel(&user_id)
                .await?
                .ok_or(TollgateError::NotFound {
                    kind: "channel",
                    name: user_id,
                })?;
        }

        let adapter = match self.adapters.get(&message.channel) {
            Some(entry) => entry.value().clone(),
            None => {
                let err = TollgateError::NotFound {
                    kind: "adapter",
                    name: message.channel.clone(),
                };
                self.audit_outbound(&message, AuditStatus::Failure, Some(&err.to_string()))
                    .await;
                return Err(err);
            }
        };

        let send_result = self.bounded(adapter.send_message(&message)).await;
        if let Err(e) = self.identities.store_message(&message).await {
            warn!(message_id = %message.id, error = %e, "outbound persistence failed");
        }

        match send_result {
            Ok(receipt) => {
                self.audit_outbound(&message, AuditStatus::Success, None).await;
                Ok(receipt)
            }
            Err(e) => {
                self.audit_outbound(&message, AuditStatus::Failure, Some(&e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn audit_outbound(&self, message: &UnifiedMessage, status: AuditStatus, error: Option<&str>) {
        let mut event =
            NewAuditEvent::new(AuditEventType::MessageOutbound, "route_outbound", status)
                .channel(&message.channel)
                .resource(&message.id);
        if let Some(user_id) = &message.user_id {
            event = event.user(user_id);
        }
        if let Some(error) = error {
            event = event.detail("error", error);
        }
        self.ledger.log_event_soft(&event).await;
    }

    /// Send `content` to a user on their preferred (or first linked)
    /// channel.
    pub async fn broadcast(
        &self,
        user_id: &str,
        content: &str,
        priority: BroadcastPriority,
    ) -> Result<SendReceipt, TollgateError> {
        let channel = match self.identities.get_preferred_channel(user_id).await? {
            Some(channel) => channel,
            None => self
                .identities
                .get_linked_channels(user_id)
                .await?
                .into_iter()
                .next()
                .ok_or(TollgateError::NotFound {
                    kind: "channel",
                    name: user_id.to_string(),
                })?,
        };

        let mut message = UnifiedMessage::outbound(&channel, user_id, content);
        message
            .metadata
            .insert("priority".to_string(), json!(priority.to_string()));

        let result = self.route_outbound(message).await;

        // Audit with the delivery outcome, not the attempt.
        let status = match &result {
            Ok(_) => AuditStatus::Success,
            Err(_) => AuditStatus::Failure,
        };
        let mut event = NewAuditEvent::new(AuditEventType::Broadcast, "broadcast", status)
            .user(user_id)
            .channel(&channel)
            .detail("priority", priority.to_string());
        if let Err(e) = &result {
            event = event.detail("error", e.to_string());
        }
        self.ledger.log_event_soft(&event).await;
        result
    }

    /// Number of channel locks created so far.
    pub fn channel_lock_count(&self) -> usize {
        self.locks.len()
    }
}
