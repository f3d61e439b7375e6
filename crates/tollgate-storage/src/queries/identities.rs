// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity CRUD operations.

use rusqlite::params;
use tollgate_core::TollgateError;
use tollgate_core::types::now_iso;

use crate::database::Database;
use crate::models::Identity;

fn identity_from_row(row: &rusqlite::Row<'_>) -> Result<Identity, rusqlite::Error> {
    Ok(Identity {
        user_id: row.get(0)?,
        channel: row.get(1)?,
        channel_user_id: row.get(2)?,
        display_name: row.get(3)?,
        paired: row.get::<_, i64>(4)? != 0,
        preferred_channel: row.get(5)?,
    })
}

/// Look up an identity by its channel pair.
pub async fn get_by_channel(
    db: &Database,
    channel: &str,
    channel_user_id: &str,
) -> Result<Option<Identity>, TollgateError> {
    let channel = channel.to_string();
    let channel_user_id = channel_user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, channel, channel_user_id, display_name, paired, preferred_channel
                 FROM identities WHERE channel = ?1 AND channel_user_id = ?2",
            )?;
            let mut rows = stmt.query_map(params![channel, channel_user_id], identity_from_row)?;
            rows.next().transpose()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or update an identity, keyed on (channel, channel_user_id).
pub async fn upsert(db: &Database, identity: &Identity) -> Result<(), TollgateError> {
    let identity = identity.clone();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO identities
                     (user_id, channel, channel_user_id, display_name, paired,
                      preferred_channel, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT (channel, channel_user_id) DO UPDATE SET
                     user_id = excluded.user_id,
                     display_name = excluded.display_name,
                     paired = excluded.paired,
                     preferred_channel = excluded.preferred_channel,
                     updated_at = excluded.updated_at",
                params![
                    identity.user_id,
                    identity.channel,
                    identity.channel_user_id,
                    identity.display_name,
                    identity.paired as i64,
                    identity.preferred_channel,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The user's preferred outbound channel, if any identity row records one.
pub async fn get_preferred_channel(
    db: &Database,
    user_id: &str,
) -> Result<Option<String>, TollgateError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT preferred_channel FROM identities
                 WHERE user_id = ?1 AND preferred_channel IS NOT NULL
                 LIMIT 1",
            )?;
            let mut rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
            rows.next().transpose()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Every channel linked to a user, preferred channel first.
pub async fn get_linked_channels(
    db: &Database,
    user_id: &str,
) -> Result<Vec<String>, TollgateError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT channel FROM identities
                 WHERE user_id = ?1
                 ORDER BY (channel = COALESCE(preferred_channel, '')) DESC, channel ASC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
            let mut channels = Vec::new();
            for row in rows {
                channels.push(row?);
            }
            Ok(channels)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn sample(user_id: &str, channel: &str, cuid: &str, paired: bool) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            channel: channel.to_string(),
            channel_user_id: cuid.to_string(),
            display_name: Some("Sam".to_string()),
            paired,
            preferred_channel: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let db = test_db().await;
        let identity = sample("u1", "telegram", "tg-9", true);
        upsert(&db, &identity).await.unwrap();

        let found = get_by_channel(&db, "telegram", "tg-9").await.unwrap();
        assert_eq!(found, Some(identity));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let db = test_db().await;
        let found = get_by_channel(&db, "telegram", "nobody").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn upsert_updates_instead_of_duplicating() {
        let db = test_db().await;
        let mut identity = sample("u1", "cli", "local", false);
        upsert(&db, &identity).await.unwrap();

        identity.paired = true;
        identity.display_name = Some("Paired Sam".to_string());
        upsert(&db, &identity).await.unwrap();

        let found = get_by_channel(&db, "cli", "local").await.unwrap().unwrap();
        assert!(found.paired);
        assert_eq!(found.display_name.as_deref(), Some("Paired Sam"));

        let count: i64 = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn linked_channels_lists_preferred_first() {
        let db = test_db().await;
        let mut tg = sample("u1", "telegram", "tg-9", true);
        tg.preferred_channel = Some("telegram".to_string());
        let mut cli = sample("u1", "cli", "local", true);
        cli.preferred_channel = Some("telegram".to_string());
        upsert(&db, &cli).await.unwrap();
        upsert(&db, &tg).await.unwrap();

        let channels = get_linked_channels(&db, "u1").await.unwrap();
        assert_eq!(channels, vec!["telegram".to_string(), "cli".to_string()]);

        let preferred = get_preferred_channel(&db, "u1").await.unwrap();
        assert_eq!(preferred.as_deref(), Some("telegram"));
    }
}
