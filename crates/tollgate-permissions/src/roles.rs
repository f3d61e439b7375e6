// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Role and grant persistence.
//!
//! Permission sets are stored as JSON arrays in the `roles` table; grants
//! reference roles with ON DELETE CASCADE, so deleting a role removes its
//! grants in the same statement.

use rusqlite::params;
use tollgate_core::TollgateError;
use tollgate_core::types::{Role, RoleGrant, now_iso};
use tollgate_storage::{Database, map_tr_err};

fn role_from_row(row: &rusqlite::Row<'_>) -> Result<Role, rusqlite::Error> {
    let permissions: String = row.get(2)?;
    Ok(Role {
        name: row.get(0)?,
        description: row.get(1)?,
        permissions: serde_json::from_str(&permissions).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?,
        priority: row.get(3)?,
        is_system: row.get::<_, i64>(4)? != 0,
    })
}

fn grant_from_row(row: &rusqlite::Row<'_>) -> Result<RoleGrant, rusqlite::Error> {
    Ok(RoleGrant {
        user_id: row.get(0)?,
        role_name: row.get(1)?,
        granted_at: row.get(2)?,
        granted_by: row.get(3)?,
        expires_at: row.get(4)?,
    })
}

const SELECT_ROLE: &str =
    "SELECT name, description, permissions, priority, is_system FROM roles WHERE name = ?1";

pub async fn get_role(db: &Database, name: &str) -> Result<Option<Role>, TollgateError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(SELECT_ROLE)?;
            let mut rows = stmt.query_map(params![name], role_from_row)?;
            rows.next().transpose()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_roles(db: &Database) -> Result<Vec<Role>, TollgateError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, description, permissions, priority, is_system
                 FROM roles ORDER BY priority DESC, name ASC",
            )?;
            let rows = stmt.query_map([], role_from_row)?;
            let mut roles = Vec::new();
            for row in rows {
                roles.push(row?);
            }
            Ok(roles)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a role. Returns false (without mutating) when the name is taken.
pub async fn insert_role(db: &Database, role: &Role) -> Result<bool, TollgateError> {
    let role = role.clone();
    let permissions = serde_json::to_string(&role.permissions)
        .map_err(|e| TollgateError::Internal(format!("permission set serialization: {e}")))?;
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO roles
                     (name, description, permissions, priority, is_system, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    role.name,
                    role.description,
                    permissions,
                    role.priority,
                    role.is_system as i64,
                    now,
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a role. Grants cascade. Returns false when no such role exists.
pub async fn delete_role(db: &Database, name: &str) -> Result<bool, TollgateError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute("DELETE FROM roles WHERE name = ?1", params![name])?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or refresh a grant, keyed on (user_id, role_name). Re-granting
/// updates granted_at, granted_by, and expires_at without duplicating.
pub async fn upsert_grant(db: &Database, grant: &RoleGrant) -> Result<(), TollgateError> {
    let grant = grant.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO role_grants (user_id, role_name, granted_at, granted_by, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id, role_name) DO UPDATE SET
                     granted_at = excluded.granted_at,
                     granted_by = excluded.granted_by,
                     expires_at = excluded.expires_at",
                params![
                    grant.user_id,
                    grant.role_name,
                    grant.granted_at,
                    grant.granted_by,
                    grant.expires_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove a grant. Returns false when the user never held the role.
pub async fn delete_grant(
    db: &Database,
    user_id: &str,
    role_name: &str,
) -> Result<bool, TollgateError> {
    let user_id = user_id.to_string();
    let role_name = role_name.to_string();
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM role_grants WHERE user_id = ?1 AND role_name = ?2",
                params![user_id, role_name],
            )?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn grants_for_user(db: &Database, user_id: &str) -> Result<Vec<RoleGrant>, TollgateError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, role_name, granted_at, granted_by, expires_at
                 FROM role_grants WHERE user_id = ?1 ORDER BY role_name ASC",
            )?;
            let rows = stmt.query_map(params![user_id], grant_from_row)?;
            let mut grants = Vec::new();
            for row in rows {
                grants.push(row?);
            }
            Ok(grants)
        })
        .await
        .map_err(map_tr_err)
}

/// The user's non-expired roles, highest priority first. Expired grants
/// for the user are swept in the same call.
pub async fn active_roles_for_user(
    db: &Database,
    user_id: &str,
) -> Result<Vec<Role>, TollgateError> {
    let user_id = user_id.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM role_grants
                 WHERE user_id = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
                params![user_id, now],
            )?;
            let mut stmt = conn.prepare(
                "SELECT r.name, r.description, r.permissions, r.priority, r.is_system
                 FROM roles r
                 JOIN role_grants g ON g.role_name = r.name
                 WHERE g.user_id = ?1
                 ORDER BY r.priority DESC, r.name ASC",
            )?;
            let rows = stmt.query_map(params![user_id], role_from_row)?;
            let mut roles = Vec::new();
            for row in rows {
                roles.push(row?);
            }
            Ok(roles)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn role(name: &str, priority: i64, permissions: &[&str]) -> Role {
        Role {
            name: name.to_string(),
            description: format!("{name} role"),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            priority,
            is_system: false,
        }
    }

    fn grant(user: &str, role: &str, expires_at: Option<String>) -> RoleGrant {
        RoleGrant {
            user_id: user.to_string(),
            role_name: role.to_string(),
            granted_at: now_iso(),
            granted_by: "test".to_string(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn insert_round_trips_permission_set() {
        let db = test_db().await;
        let r = role("editor", 20, &["files:read", "files:write"]);
        assert!(insert_role(&db, &r).await.unwrap());

        let found = get_role(&db, "editor").await.unwrap().unwrap();
        assert_eq!(found, r);
    }

    #[tokio::test]
    async fn duplicate_insert_is_reported_not_applied() {
        let db = test_db().await;
        let r = role("editor", 20, &["files:read"]);
        assert!(insert_role(&db, &r).await.unwrap());

        let clash = role("editor", 99, &["*:*"]);
        assert!(!insert_role(&db, &clash).await.unwrap());
        let found = get_role(&db, "editor").await.unwrap().unwrap();
        assert_eq!(found.priority, 20);
    }

    #[tokio::test]
    async fn delete_role_cascades_grants() {
        let db = test_db().await;
        insert_role(&db, &role("editor", 20, &["files:read"]))
            .await
            .unwrap();
        upsert_grant(&db, &grant("u1", "editor", None)).await.unwrap();

        assert!(delete_role(&db, "editor").await.unwrap());
        assert!(grants_for_user(&db, "u1").await.unwrap().is_empty());
        assert!(!delete_role(&db, "editor").await.unwrap());
    }

    #[tokio::test]
    async fn regrant_updates_without_duplicating() {
        let db = test_db().await;
        insert_role(&db, &role("editor", 20, &["files:read"]))
            .await
            .unwrap();
        upsert_grant(&db, &grant("u1", "editor", None)).await.unwrap();
        let later = (chrono::Utc::now() + chrono::Duration::hours(1))
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        upsert_grant(&db, &grant("u1", "editor", Some(later.clone())))
            .await
            .unwrap();

        let grants = grants_for_user(&db, "u1").await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].expires_at.as_deref(), Some(later.as_str()));
    }

    #[tokio::test]
    async fn expired_grants_are_excluded_and_swept() {
        let db = test_db().await;
        insert_role(&db, &role("editor", 20, &["files:read"]))
            .await
            .unwrap();
        insert_role(&db, &role("viewer", 5, &["files:list"]))
            .await
            .unwrap();
        let past = (chrono::Utc::now() - chrono::Duration::hours(1))
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        upsert_grant(&db, &grant("u1", "editor", Some(past))).await.unwrap();
        upsert_grant(&db, &grant("u1", "viewer", None)).await.unwrap();

        let roles = active_roles_for_user(&db, "u1").await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "viewer");

        // The expired row was physically removed, not just filtered.
        let grants = grants_for_user(&db, "u1").await.unwrap();
        assert_eq!(grants.len(), 1);
    }

    #[tokio::test]
    async fn active_roles_order_by_priority_descending() {
        let db = test_db().await;
        insert_role(&db, &role("low", 1, &["a:b"])).await.unwrap();
        insert_role(&db, &role("high", 90, &["c:d"])).await.unwrap();
        upsert_grant(&db, &grant("u1", "low", None)).await.unwrap();
        upsert_grant(&db, &grant("u1", "high", None)).await.unwrap();

        let roles = active_roles_for_user(&db, "u1").await.unwrap();
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
    }
}
