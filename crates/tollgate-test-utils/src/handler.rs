// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use tollgate_core::TollgateError;
use tollgate_core::traits::MessageHandler;
use tollgate_core::types::UnifiedMessage;

/// Handler double that appends `start`/`end` markers to a shared trace,
/// optionally sleeping in between. Ordering tests assert on the trace.
pub struct RecordingHandler {
    name: String,
    trace: Arc<Mutex<Vec<String>>>,
    latency: Option<Duration>,
    fail: bool,
}

impl RecordingHandler {
    pub fn new(name: &str, trace: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            trace,
            latency: None,
            fail: false,
        }
    }

    /// Sleep between the start and end markers.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Return an error from every `handle` call (after recording).
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// A fresh shared trace for a group of handlers.
    pub fn shared_trace() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, msg: &UnifiedMessage) -> Result<(), TollgateError> {
        self.trace
            .lock()
            .unwrap()
            .push(format!("start:{}:{}", self.name, msg.id));
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.trace
            .lock()
            .unwrap()
            .push(format!("end:{}:{}", self.name, msg.id));
        if self.fail {
            return Err(TollgateError::Internal(format!(
                "{} failed on purpose",
                self.name
            )));
        }
        Ok(())
    }
}
