// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message routing and the inbound security pipeline.
//!
//! One lock per channel keeps same-channel traffic in strict arrival
//! order; distinct channels overlap freely. The pipeline short-circuits
//! on the first failing stage and reports a machine-readable reason
//! instead of erroring.

pub mod locks;
pub mod outcome;
pub mod router;

pub use outcome::{HandlerResult, RouteOutcome};
pub use router::MessageRouter;
