//! Turn runtime
//!
//! One inbound message is one turn: load the bags, rebuild the dialog
//! stack, let the scorables or the stack handle the message, persist, and
//! only then deliver the replies.

mod executor;
pub mod traits;

#[cfg(test)]
mod testing;

pub use executor::{BotRuntime, RootFactory};
pub use traits::MessageSink;

use crate::bot_data::{BotDataError, StoreError};
use crate::fiber::{Fault, FiberError, Need};
use crate::message::Message;
use crate::scorable::ScorableError;
use crate::serialization::SerializationError;
use thiserror::Error;

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Replies, in the order they were delivered
    pub messages: Vec<Message>,
    /// State of the dialog stack after the turn
    pub need: Need,
    /// Whether a scorable took the message instead of the dialog stack
    pub intercepted: bool,
}

#[derive(Debug, Error)]
pub enum TurnError {
    /// No dialog recovered from the fault; the stack was reset
    #[error("Unhandled dialog fault: {0}")]
    Faulted(Fault),
    #[error("Invalid dialog stack operation: {0}")]
    Fiber(#[from] FiberError),
    /// The persisted stack cannot be resumed; see `BotRuntime::reset_dialog`
    #[error("Dialog state could not be restored: {0}")]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Data(BotDataError),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Scorable(#[from] ScorableError),
    #[error("Message delivery failed: {0}")]
    Sink(String),
}

impl From<BotDataError> for TurnError {
    fn from(e: BotDataError) -> Self {
        match e {
            BotDataError::Store(e) => TurnError::Store(e),
            other => TurnError::Data(other),
        }
    }
}

impl TurnError {
    /// A concurrent turn for the same conversation won; retrying with
    /// fresh state may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, TurnError::Store(StoreError::PreconditionFailed { .. }))
    }
}
