// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory collaborator doubles for exercising the gateway without a
//! real messaging platform, sanitizer service, or identity backend.
//!
//! Everything here is deliberately synchronous-state-behind-a-mutex:
//! assertions read recorded calls after the fact.

mod adapter;
mod handler;
mod identity;
mod sanitizer;

pub use adapter::MockChannelAdapter;
pub use handler::RecordingHandler;
pub use identity::MemoryIdentityStore;
pub use sanitizer::MockSanitizer;
