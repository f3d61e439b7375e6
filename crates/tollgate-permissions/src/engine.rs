// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Role-based authorization.
//!
//! The engine resolves a user's permission set from their non-expired
//! grants (highest role priority first) and answers `check_permission`
//! via wildcard matching. Five system roles are seeded at init and can
//! never be deleted. Every check, grant, revoke, create, and delete is
//! audited with its outcome.

use serde::Serialize;
use tracing::{debug, info};

use tollgate_audit::{AuditLedger, NewAuditEvent};
use tollgate_core::TollgateError;
use tollgate_core::types::{AuditEventType, AuditStatus, Role, RoleGrant, now_iso};
use tollgate_storage::Database;

use crate::matcher::{matches_any, permission_matches, validate_permission};
use crate::roles;

/// Permissions that warrant an elevation prompt even when the caller
/// holds them.
pub const ELEVATED_PERMISSIONS: &[&str] =
    &["roles:manage", "audit:cleanup", "rate:reset", "system:admin"];

/// Result of an authorization check.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionCheck {
    pub allowed: bool,
    pub requires_elevation: bool,
    pub user_permissions: Vec<String>,
}

fn system_roles() -> Vec<Role> {
    let role = |name: &str, description: &str, priority: i64, permissions: &[&str]| Role {
        name: name.to_string(),
        description: description.to_string(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        priority,
        is_system: true,
    };
    vec![
        role("guest", "Unpaired or unknown users", 0, &["chat:read"]),
        role(
            "member",
            "Paired users with ordinary access",
            10,
            &["chat:read", "chat:send", "memory:read"],
        ),
        role(
            "operator",
            "Trusted users who manage day-to-day operations",
            50,
            &[
                "chat:read",
                "chat:send",
                "memory:read",
                "memory:write",
                "rate:status",
                "audit:read",
            ],
        ),
        role(
            "admin",
            "Administrators of the gateway",
            80,
            &[
                "chat:*",
                "memory:*",
                "rate:*",
                "audit:read",
                "audit:export",
                "roles:manage",
            ],
        ),
        role("owner", "Unrestricted owner", 100, &["*:*"]),
    ]
}

/// Authorization engine backed by the roles and role_grants tables.
pub struct PermissionEngine {
    db: Database,
    ledger: AuditLedger,
}

impl PermissionEngine {
    /// Construct the engine and seed the system roles. Seeding is
    /// idempotent: existing rows, including locally modified permission
    /// sets, are left alone.
    pub async fn new(db: Database, ledger: AuditLedger) -> Result<Self, TollgateError> {
        for role in system_roles() {
            if roles::insert_role(&db, &role).await? {
                debug!(role = %role.name, "seeded system role");
            }
        }
        Ok(Self { db, ledger })
    }

    /// Union of permission strings from every non-expired granted role,
    /// ordered by role priority descending, deduplicated.
    pub async fn get_user_permissions(&self, user_id: &str) -> Result<Vec<String>, TollgateError> {
        let roles = roles::active_roles_for_user(&self.db, user_id).await?;
        let mut permissions = Vec::new();
        for role in roles {
            for permission in role.permissions {
                if !permissions.contains(&permission) {
                    permissions.push(permission);
                }
            }
        }
        Ok(permissions)
    }

    /// Authorize `permission` for `user_id`. Never errors on a plain
    /// denial: the verdict carries the outcome.
    pub async fn check_permission(
        &self,
        user_id: &str,
        permission: &str,
    ) -> Result<PermissionCheck, TollgateError> {
        validate_permission(permission)?;
        let user_permissions = self.get_user_permissions(user_id).await?;
        let allowed = matches_any(&user_permissions, permission);
        let requires_elevation = ELEVATED_PERMISSIONS
            .iter()
            .any(|elevated| permission_matches(permission, elevated) || *elevated == permission);

        self.ledger
            .log_event_soft(
                &NewAuditEvent::new(
                    AuditEventType::PermissionCheck,
                    permission,
                    if allowed {
                        AuditStatus::Success
                    } else {
                        AuditStatus::Blocked
                    },
                )
                .user(user_id)
                .detail("requires_elevation", requires_elevation),
            )
            .await;

        Ok(PermissionCheck {
            allowed,
            requires_elevation,
            user_permissions,
        })
    }

    pub async fn get_role(&self, name: &str) -> Result<Option<Role>, TollgateError> {
        roles::get_role(&self.db, name).await
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, TollgateError> {
        roles::list_roles(&self.db).await
    }

    pub async fn get_user_grants(&self, user_id: &str) -> Result<Vec<RoleGrant>, TollgateError> {
        roles::grants_for_user(&self.db, user_id).await
    }

    /// Create a custom role. Name must be unique; every permission entry
    /// must be a valid `resource:action` string.
    pub async fn create_role(
        &self,
        name: &str,
        description: &str,
        permissions: &[String],
        priority: i64,
        created_by: &str,
    ) -> Result<Role, TollgateError> {
        if name.trim().is_empty() {
            return Err(TollgateError::Validation(
                "role name must not be empty".to_string(),
            ));
        }
        for permission in permissions {
            validate_permission(permission)?;
        }

        let role = Role {
            name: name.to_string(),
            description: description.to_string(),
            permissions: permissions.to_vec(),
            priority,
            is_system: false,
        };
        if !roles::insert_role(&self.db, &role).await? {
            return Err(TollgateError::Validation(format!(
                "role {name:?} already exists"
            )));
        }

        info!(role = name, priority, "role created");
        self.ledger
            .log_event_soft(
                &NewAuditEvent::new(AuditEventType::RoleCreated, "create_role", AuditStatus::Success)
                    .user(created_by)
                    .resource(name)
                    .detail("priority", priority),
            )
            .await;
        Ok(role)
    }

    /// Delete a custom role. System roles are refused; grants cascade.
    pub async fn delete_role(&self, name: &str, deleted_by: &str) -> Result<(), TollgateError> {
        let role = roles::get_role(&self.db, name)
            .await?
            .ok_or_else(|| TollgateError::NotFound {
                kind: "role",
                name: name.to_string(),
            })?;
        if role.is_system {
            self.ledger
                .log_event_soft(
                    &NewAuditEvent::new(
                        AuditEventType::RoleDeleted,
                        "delete_role",
                        AuditStatus::Failure,
                    )
                    .user(deleted_by)
                    .resource(name)
                    .detail("reason", "system role"),
                )
                .await;
            return Err(TollgateError::Validation(format!(
                "role {name:?} is a system role and cannot be deleted"
            )));
        }

        roles::delete_role(&self.db, name).await?;
        info!(role = name, "role deleted");
        self.ledger
            .log_event_soft(
                &NewAuditEvent::new(AuditEventType::RoleDeleted, "delete_role", AuditStatus::Success)
                    .user(deleted_by)
                    .resource(name),
            )
            .await;
        Ok(())
    }

    /// Grant a role to a user. Idempotent: re-granting refreshes the
    /// grant metadata and never duplicates. `expires_at`, when present,
    /// must be an RFC-3339 timestamp.
    pub async fn grant_role(
        &self,
        user_id: &str,
        role_name: &str,
        granted_by: &str,
        expires_at: Option<&str>,
    ) -> Result<(), TollgateError> {
        roles::get_role(&self.db, role_name)
            .await?
            .ok_or_else(|| TollgateError::NotFound {
                kind: "role",
                name: role_name.to_string(),
            })?;
        if let Some(expiry) = expires_at {
            chrono::DateTime::parse_from_rfc3339(expiry).map_err(|e| {
                TollgateError::Validation(format!("invalid expires_at {expiry:?}: {e}"))
            })?;
        }

        let grant = RoleGrant {
            user_id: user_id.to_string(),
            role_name: role_name.to_string(),
            granted_at: now_iso(),
            granted_by: granted_by.to_string(),
            expires_at: expires_at.map(|s| s.to_string()),
        };
        roles::upsert_grant(&self.db, &grant).await?;

        info!(user_id, role = role_name, "role granted");
        self.ledger
            .log_event_soft(
                &NewAuditEvent::new(AuditEventType::RoleGranted, "grant_role", AuditStatus::Success)
                    .user(granted_by)
                    .resource(&format!("{user_id}:{role_name}")),
            )
            .await;
        Ok(())
    }

    /// Revoke a role from a user. Strict: revoking an ungranted role is
    /// a NotFound error.
    pub async fn revoke_role(
        &self,
        user_id: &str,
        role_name: &str,
        revoked_by: &str,
    ) -> Result<(), TollgateError> {
        if !roles::delete_grant(&self.db, user_id, role_name).await? {
            self.ledger
                .log_event_soft(
                    &NewAuditEvent::new(
                        AuditEventType::RoleRevoked,
                        "revoke_role",
                        AuditStatus::Failure,
                    )
                    .user(revoked_by)
                    .resource(&format!("{user_id}:{role_name}"))
                    .detail("reason", "not granted"),
                )
                .await;
            return Err(TollgateError::NotFound {
                kind: "grant",
                name: format!("{user_id}:{role_name}"),
            });
        }

        info!(user_id, role = role_name, "role revoked");
        self.ledger
            .log_event_soft(
                &NewAuditEvent::new(AuditEventType::RoleRevoked, "revoke_role", AuditStatus::Success)
                    .user(revoked_by)
                    .resource(&format!("{user_id}:{role_name}")),
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::types::AuditEventType;

    async fn test_engine() -> PermissionEngine {
        let db = Database::open_in_memory().await.unwrap();
        let ledger = AuditLedger::new(db.clone());
        PermissionEngine::new(db, ledger).await.unwrap()
    }

    #[tokio::test]
    async fn system_roles_are_seeded_idempotently() {
        let engine = test_engine().await;
        let roles = engine.list_roles().await.unwrap();
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["owner", "admin", "operator", "member", "guest"]);

        // Re-init over the same database must not duplicate or overwrite.
        let engine2 = PermissionEngine::new(engine.db.clone(), engine.ledger.clone())
            .await
            .unwrap();
        assert_eq!(engine2.list_roles().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unknown_user_has_no_permissions() {
        let engine = test_engine().await;
        let check = engine.check_permission("nobody", "chat:send").await.unwrap();
        assert!(!check.allowed);
        assert!(check.user_permissions.is_empty());
    }

    #[tokio::test]
    async fn member_can_send_but_not_manage_roles() {
        let engine = test_engine().await;
        engine.grant_role("u1", "member", "system", None).await.unwrap();

        assert!(engine.check_permission("u1", "chat:send").await.unwrap().allowed);
        assert!(!engine.check_permission("u1", "roles:manage").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn owner_wildcard_wins_regardless_of_grant_order() {
        let engine = test_engine().await;
        engine.grant_role("u1", "guest", "system", None).await.unwrap();
        engine.grant_role("u1", "owner", "system", None).await.unwrap();

        let check = engine
            .check_permission("u1", "anything:whatsoever")
            .await
            .unwrap();
        assert!(check.allowed);
        // Owner's priority (100) sorts its permissions first in the union.
        assert_eq!(check.user_permissions.first().map(|s| s.as_str()), Some("*:*"));
    }

    #[tokio::test]
    async fn elevation_is_flagged_even_when_allowed() {
        let engine = test_engine().await;
        engine.grant_role("u1", "owner", "system", None).await.unwrap();

        let check = engine.check_permission("u1", "audit:cleanup").await.unwrap();
        assert!(check.allowed);
        assert!(check.requires_elevation);

        let plain = engine.check_permission("u1", "chat:send").await.unwrap();
        assert!(plain.allowed);
        assert!(!plain.requires_elevation);
    }

    #[tokio::test]
    async fn permission_union_orders_by_priority_and_dedupes() {
        let engine = test_engine().await;
        engine
            .create_role("curator", "curates", &["memory:read".to_string()], 5, "admin-1")
            .await
            .unwrap();
        engine.grant_role("u1", "member", "system", None).await.unwrap();
        engine.grant_role("u1", "curator", "system", None).await.unwrap();

        let permissions = engine.get_user_permissions("u1").await.unwrap();
        // member (10) outranks curator (5); memory:read appears once.
        assert_eq!(permissions, vec!["chat:read", "chat:send", "memory:read"]);
    }

    #[tokio::test]
    async fn create_role_rejects_duplicates_and_bad_permissions() {
        let engine = test_engine().await;
        let err = engine
            .create_role("member", "clash", &[], 1, "admin-1")
            .await
            .unwrap_err();
        assert!(matches!(err, TollgateError::Validation(_)));

        let err = engine
            .create_role("broken", "bad perms", &["no_colon".to_string()], 1, "admin-1")
            .await
            .unwrap_err();
        assert!(matches!(err, TollgateError::Validation(_)));
    }

    #[tokio::test]
    async fn system_roles_cannot_be_deleted() {
        let engine = test_engine().await;
        let err = engine.delete_role("owner", "admin-1").await.unwrap_err();
        assert!(matches!(err, TollgateError::Validation(_)));
        assert!(engine.get_role("owner").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_custom_role_revokes_it_everywhere() {
        let engine = test_engine().await;
        engine
            .create_role("temp", "temporary", &["chat:send".to_string()], 1, "admin-1")
            .await
            .unwrap();
        engine.grant_role("u1", "temp", "admin-1", None).await.unwrap();
        assert!(engine.check_permission("u1", "chat:send").await.unwrap().allowed);

        engine.delete_role("temp", "admin-1").await.unwrap();
        assert!(!engine.check_permission("u1", "chat:send").await.unwrap().allowed);
        assert!(engine.get_user_grants("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn grant_is_idempotent_and_revoke_is_strict() {
        let engine = test_engine().await;
        engine.grant_role("u1", "member", "admin-1", None).await.unwrap();
        engine.grant_role("u1", "member", "admin-2", None).await.unwrap();

        let grants = engine.get_user_grants("u1").await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].granted_by, "admin-2");

        engine.revoke_role("u1", "member", "admin-1").await.unwrap();
        let err = engine.revoke_role("u1", "member", "admin-1").await.unwrap_err();
        assert!(matches!(err, TollgateError::NotFound { .. }));
    }

    #[tokio::test]
    async fn grant_of_unknown_role_is_not_found() {
        let engine = test_engine().await;
        let err = engine
            .grant_role("u1", "ghost", "admin-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TollgateError::NotFound { kind: "role", .. }));
    }

    #[tokio::test]
    async fn expired_grant_stops_authorizing() {
        let engine = test_engine().await;
        let past = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        engine
            .grant_role("u1", "member", "admin-1", Some(&past))
            .await
            .unwrap();

        let check = engine.check_permission("u1", "chat:send").await.unwrap();
        assert!(!check.allowed);
    }

    #[tokio::test]
    async fn checks_are_audited_with_outcome() {
        let engine = test_engine().await;
        engine.grant_role("u1", "member", "admin-1", None).await.unwrap();
        engine.check_permission("u1", "chat:send").await.unwrap();
        engine.check_permission("u1", "system:admin").await.unwrap();

        let filter = tollgate_audit::EventFilter {
            event_type: Some(AuditEventType::PermissionCheck),
            ..Default::default()
        };
        let page = engine.ledger.query_events(&filter, 10, 0).await.unwrap();
        assert_eq!(page.total, 2);
        let statuses: Vec<AuditStatus> = page.events.iter().map(|e| e.status).collect();
        assert!(statuses.contains(&AuditStatus::Success));
        assert!(statuses.contains(&AuditStatus::Blocked));
    }
}
