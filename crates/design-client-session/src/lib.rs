//! Session orchestration for the design client.
//!
//! Provides:
//! - `OperationPump` - drain/poll loop against the design server
//! - `DesignClient` - runs the pump in the background and reports how it ended
//! - `SessionError` - session-fatal errors

pub mod controller;
pub mod error;
pub mod pump;

#[cfg(test)]
mod testing;

pub use controller::DesignClient;
pub use error::SessionError;
pub use pump::{CompletionReason, OperationPump, PumpOutcome, PumpState};
