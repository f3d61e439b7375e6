// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence for traffic that passed the pipeline.

use std::str::FromStr;

use rusqlite::params;
use tollgate_core::TollgateError;
use tollgate_core::types::{Direction, now_iso};

use crate::database::Database;
use crate::models::UnifiedMessage;

/// Insert a routed message.
pub async fn insert_message(db: &Database, msg: &UnifiedMessage) -> Result<(), TollgateError> {
    let msg = msg.clone();
    let now = now_iso();
    let attachments = serde_json::to_string(&msg.attachments)
        .map_err(|e| TollgateError::Internal(format!("encode attachments: {e}")))?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages
                     (id, channel, channel_message_id, channel_user_id, user_id, direction,
                      content, content_type, attachments, reply_to, session_id, metadata,
                      created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    msg.id,
                    msg.channel,
                    msg.channel_message_id,
                    msg.channel_user_id,
                    msg.user_id,
                    msg.direction.to_string(),
                    msg.content,
                    msg.content_type,
                    attachments,
                    msg.reply_to,
                    msg.session_id,
                    serde_json::Value::Object(msg.metadata).to_string(),
                    now,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Messages for a channel in arrival order, newest last.
pub async fn get_messages_for_channel(
    db: &Database,
    channel: &str,
    limit: i64,
) -> Result<Vec<UnifiedMessage>, TollgateError> {
    let channel = channel.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, channel, channel_message_id, channel_user_id, user_id, direction,
                        content, content_type, attachments, reply_to, session_id, metadata,
                        created_at
                 FROM messages WHERE channel = ?1
                 ORDER BY created_at ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![channel, limit], |row| {
                let direction: String = row.get(5)?;
                let attachments: String = row.get(8)?;
                let metadata: Option<String> = row.get(11)?;
                Ok(UnifiedMessage {
                    id: row.get(0)?,
                    channel: row.get(1)?,
                    channel_message_id: row.get(2)?,
                    channel_user_id: row.get(3)?,
                    user_id: row.get(4)?,
                    direction: Direction::from_str(&direction).map_err(|_| {
                        rusqlite::Error::FromSqlConversionFailure(
                            5,
                            rusqlite::types::Type::Text,
                            format!("unknown direction {direction:?}").into(),
                        )
                    })?,
                    content: row.get(6)?,
                    content_type: row.get(7)?,
                    attachments: serde_json::from_str(&attachments).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            8,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                    reply_to: row.get(9)?,
                    timestamp: row.get(12)?,
                    session_id: row.get(10)?,
                    metadata: metadata
                        .and_then(|m| serde_json::from_str(&m).ok())
                        .unwrap_or_default(),
                })
            })?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
