//! Continuation faults

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a continuation fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Raised by dialog-authored code
    Dialog,
    /// Cooperative cancellation requested by an ancestor or a scorable
    Cancelled,
    /// A prompt ran out of attempts
    TooManyAttempts,
    /// A value could not be converted to or from its item representation
    Data,
}

/// A fault raised inside a continuation.
///
/// Faults travel up the dialog stack as the `Err` side of an `Outcome`, so
/// every ancestor gets a chance to recover before the turn fails.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn dialog(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Dialog, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Cancelled, message)
    }

    pub fn too_many_attempts(message: impl Into<String>) -> Self {
        Self::new(FaultKind::TooManyAttempts, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Data, message)
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind == FaultKind::Cancelled
    }
}

impl From<serde_json::Error> for Fault {
    fn from(e: serde_json::Error) -> Self {
        Fault::data(e.to_string())
    }
}
