// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions for the Tollgate trust boundary.
//!
//! The router consumes every external collaborator through these narrow
//! interfaces, using `#[async_trait]` for dynamic dispatch compatibility.

pub mod channel;
pub mod handler;
pub mod identity;
pub mod sanitizer;

pub use channel::ChannelAdapter;
pub use handler::MessageHandler;
pub use identity::IdentityStore;
pub use sanitizer::Sanitizer;
