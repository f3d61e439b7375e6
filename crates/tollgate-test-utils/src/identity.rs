// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use tollgate_core::TollgateError;
use tollgate_core::traits::IdentityStore;
use tollgate_core::types::{Identity, UnifiedMessage};

/// Identity Store double holding identities and persisted messages in
/// process memory.
#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: Mutex<HashMap<(String, String), Identity>>,
    messages: Mutex<Vec<UnifiedMessage>>,
    fail: Mutex<bool>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a paired identity for (channel, channel_user_id).
    pub fn pair(&self, user_id: &str, channel: &str, channel_user_id: &str) {
        let identity = Identity {
            user_id: user_id.to_string(),
            channel: channel.to_string(),
            channel_user_id: channel_user_id.to_string(),
            display_name: None,
            paired: true,
            preferred_channel: None,
        };
        self.identities
            .lock()
            .unwrap()
            .insert((channel.to_string(), channel_user_id.to_string()), identity);
    }

    /// Set the preferred outbound channel on every identity of a user.
    pub fn set_preferred_channel(&self, user_id: &str, channel: &str) {
        let mut identities = self.identities.lock().unwrap();
        for identity in identities.values_mut() {
            if identity.user_id == user_id {
                identity.preferred_channel = Some(channel.to_string());
            }
        }
    }

    /// Make every subsequent store call fail.
    pub fn fail_all(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Messages persisted so far, in order.
    pub fn stored_messages(&self) -> Vec<UnifiedMessage> {
        self.messages.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), TollgateError> {
        if *self.fail.lock().unwrap() {
            return Err(TollgateError::Internal(
                "identity store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_user_by_channel(
        &self,
        channel: &str,
        channel_user_id: &str,
    ) -> Result<Option<Identity>, TollgateError> {
        self.check_failure()?;
        Ok(self
            .identities
            .lock()
            .unwrap()
            .get(&(channel.to_string(), channel_user_id.to_string()))
            .cloned())
    }

    async fn create_or_update_user(&self, identity: &Identity) -> Result<(), TollgateError> {
        self.check_failure()?;
        self.identities.lock().unwrap().insert(
            (identity.channel.clone(), identity.channel_user_id.clone()),
            identity.clone(),
        );
        Ok(())
    }

    async fn store_message(&self, msg: &UnifiedMessage) -> Result<(), TollgateError> {
        self.check_failure()?;
        self.messages.lock().unwrap().push(msg.clone());
        Ok(())
    }

    async fn get_preferred_channel(
        &self,
        user_id: &str,
    ) -> Result<Option<String>, TollgateError> {
        self.check_failure()?;
        Ok(self
            .identities
            .lock()
            .unwrap()
            .values()
            .find(|i| i.user_id == user_id && i.preferred_channel.is_some())
            .and_then(|i| i.preferred_channel.clone()))
    }

    async fn get_linked_channels(&self, user_id: &str) -> Result<Vec<String>, TollgateError> {
        self.check_failure()?;
        let identities = self.identities.lock().unwrap();
        let preferred = identities
            .values()
            .find(|i| i.user_id == user_id && i.preferred_channel.is_some())
            .and_then(|i| i.preferred_channel.clone());
        let mut channels: Vec<String> = identities
            .values()
            .filter(|i| i.user_id == user_id)
            .map(|i| i.channel.clone())
            .collect();
        channels.sort();
        channels.dedup();
        if let Some(preferred) = preferred {
            channels.retain(|c| *c != preferred);
            channels.insert(0, preferred);
        }
        Ok(channels)
    }
}
