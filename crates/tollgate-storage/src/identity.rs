// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the IdentityStore collaborator trait.

use async_trait::async_trait;

use tollgate_core::TollgateError;
use tollgate_core::traits::IdentityStore;
use tollgate_core::types::{Identity, UnifiedMessage};

use crate::database::Database;
use crate::queries;

/// SQLite-backed identity store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
#[derive(Clone)]
pub struct SqliteIdentityStore {
    db: Database,
}

impl SqliteIdentityStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn get_user_by_channel(
        &self,
        channel: &str,
        channel_user_id: &str,
    ) -> Result<Option<Identity>, TollgateError> {
        queries::identities::get_by_channel(&self.db, channel, channel_user_id).await
    }

    async fn create_or_update_user(&self, identity: &Identity) -> Result<(), TollgateError> {
        queries::identities::upsert(&self.db, identity).await
    }

    async fn store_message(&self, msg: &UnifiedMessage) -> Result<(), TollgateError> {
        queries::messages::insert_message(&self.db, msg).await
    }

    async fn get_preferred_channel(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, TollgateError> {
        queries::identities::get_preferred_channel(&self.db, user_id).await
    }

    async fn get_linked_channels(&self, user_id: &str) -> Result<Vec<String>, TollgateError> {
        queries::identities::get_linked_channels(&self.db, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trait_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let store = SqliteIdentityStore::new(db);

        let mut identity = Identity::unpaired("cli", "local");
        store.create_or_update_user(&identity).await.unwrap();

        let found = store.get_user_by_channel("cli", "local").await.unwrap();
        assert_eq!(found.as_ref().map(|i| i.paired), Some(false));

        identity.paired = true;
        identity.preferred_channel = Some("cli".to_string());
        store.create_or_update_user(&identity).await.unwrap();

        let preferred = store
            .get_preferred_channel(&identity.user_id)
            .await
            .unwrap();
        assert_eq!(preferred.as_deref(), Some("cli"));

        let mut msg = UnifiedMessage::inbound("cli", "local", "hi");
        msg.user_id = Some(identity.user_id.clone());
        store.store_message(&msg).await.unwrap();
    }
}
