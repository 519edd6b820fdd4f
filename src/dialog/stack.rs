//! The dialog stack: a fiber whose frames are dialogs

use super::{Dialog, DialogContext, START};
use crate::fiber::{Fault, Fiber, FiberError, Item, Need, Resumable};
use crate::message::Message;
use crate::session::Session;

#[derive(Debug, Default)]
pub struct DialogStack {
    fiber: Fiber<Box<dyn Dialog>>,
}

impl DialogStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_fiber(fiber: Fiber<Box<dyn Dialog>>) -> Self {
        Self { fiber }
    }

    pub(crate) fn fiber(&self) -> &Fiber<Box<dyn Dialog>> {
        &self.fiber
    }

    pub fn depth(&self) -> usize {
        self.fiber.depth()
    }

    pub fn is_empty(&self) -> bool {
        self.fiber.is_empty()
    }

    pub fn need(&self) -> Need {
        self.fiber.need()
    }

    /// Type names of the active dialogs, root first
    pub fn dialogs(&self) -> Vec<&'static str> {
        self.fiber
            .frames()
            .iter()
            .filter_map(|f| f.target())
            .map(|d| d.type_name())
            .collect()
    }

    /// Push a dialog from outside any continuation.
    ///
    /// On a non-empty stack this interrupts the waiting top dialog: when
    /// the new dialog completes its result is dropped and the interrupted
    /// dialog keeps waiting. A fault still reaches it.
    pub fn call(&mut self, dialog: Box<dyn Dialog>) -> Result<(), FiberError> {
        tracing::debug!(dialog = dialog.type_name(), depth = self.depth(), "Calling dialog");
        self.fiber.call(dialog, START, Item::unit())
    }

    /// Deliver a message to the waiting top dialog
    pub fn post(&mut self, message: &Message) -> Result<(), FiberError> {
        self.fiber.post(Ok(Item::new(message)?))
    }

    /// Deliver a typed value to a top dialog suspended in `wait_for`
    pub fn post_value<T: Resumable>(&mut self, value: &T) -> Result<(), FiberError> {
        self.fiber.post(Ok(Item::new(value)?))
    }

    /// Deliver a fault to the waiting top dialog
    pub fn fail(&mut self, fault: Fault) -> Result<(), FiberError> {
        self.fiber.fail(fault)
    }

    pub fn reset(&mut self) {
        self.fiber.reset();
    }

    /// Run continuations until the stack waits again or is exhausted
    pub fn poll(&mut self, session: &mut Session) -> Result<Need, FiberError> {
        self.fiber.poll(|dialog, rest, outcome, handle| {
            tracing::debug!(
                dialog = dialog.type_name(),
                rest = %rest,
                depth = handle.depth(),
                "Resuming dialog"
            );
            let mut ctx = DialogContext::new(handle, session);
            if rest == START {
                dialog.start(&mut ctx, outcome?)
            } else {
                dialog.resume(&mut ctx, rest, outcome)
            }
        })
    }

    /// Route the session's inbound message into the stack.
    ///
    /// An empty stack first starts `root`, which must reach a wait before
    /// the message can be delivered.
    pub fn deliver<F>(&mut self, session: &mut Session, root: F) -> Result<Need, FiberError>
    where
        F: FnOnce() -> Box<dyn Dialog>,
    {
        if self.is_empty() {
            self.call(root())?;
            if self.poll(session)? != Need::Wait {
                return Ok(self.need());
            }
        }
        if self.need() == Need::Wait {
            let message = session.message().clone();
            self.post(&message)?;
        }
        self.poll(session)
    }
}
