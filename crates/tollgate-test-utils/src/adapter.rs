// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use tollgate_core::TollgateError;
use tollgate_core::traits::ChannelAdapter;
use tollgate_core::types::{SendReceipt, UnifiedMessage};

/// Adapter double that records every outbound message.
pub struct MockChannelAdapter {
    name: String,
    connected: AtomicBool,
    fail_send: AtomicBool,
    sent: Mutex<Vec<UnifiedMessage>>,
}

impl MockChannelAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            connected: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent `send_message` fail.
    pub fn fail_sends(&self) {
        self.fail_send.store(true, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Messages delivered so far, in order.
    pub fn sent(&self) -> Vec<UnifiedMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelAdapter for MockChannelAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), TollgateError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TollgateError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_message(&self, msg: &UnifiedMessage) -> Result<SendReceipt, TollgateError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TollgateError::Channel {
                message: format!("{} delivery refused", self.name),
                source: None,
            });
        }
        self.sent.lock().unwrap().push(msg.clone());
        Ok(SendReceipt {
            success: true,
            message_id: Some(format!("{}-{}", self.name, msg.id)),
        })
    }

    // The mock's "wire shape" is the unified message itself.
    fn to_unified(&self, raw: serde_json::Value) -> Result<UnifiedMessage, TollgateError> {
        serde_json::from_value(raw).map_err(|e| {
            TollgateError::Validation(format!("malformed {} payload: {e}", self.name))
        })
    }

    fn from_unified(&self, msg: &UnifiedMessage) -> Result<serde_json::Value, TollgateError> {
        serde_json::to_value(msg)
            .map_err(|e| TollgateError::Internal(format!("encode {} payload: {e}", self.name)))
    }
}
