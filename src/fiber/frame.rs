//! Stack frames

use super::wait::{Item, Wait};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One entry in the fiber's call stack.
///
/// The target is detached while its continuation runs and reattached
/// afterwards, so at every externally observable point it is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame<T> {
    pub(crate) target: Option<T>,
    pub wait: Wait,
    /// Continuations that receive this frame's completion before the parent
    #[serde(default, skip_serializing_if = "VecDeque::is_empty")]
    pub chain: VecDeque<String>,
    /// Item posted to the frame's first external wait
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<Item>,
}

impl<T> Frame<T> {
    pub fn new(target: T, wait: Wait) -> Self {
        Self {
            target: Some(target),
            wait,
            chain: VecDeque::new(),
            forward: None,
        }
    }

    pub fn with_chain(mut self, chain: impl IntoIterator<Item = String>) -> Self {
        self.chain.extend(chain);
        self
    }

    pub fn with_forward(mut self, forward: Option<Item>) -> Self {
        self.forward = forward;
        self
    }

    pub fn target(&self) -> Option<&T> {
        self.target.as_ref()
    }
}
