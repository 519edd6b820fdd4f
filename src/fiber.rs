//! Serializable continuation engine
//!
//! A fiber is an explicit stack of frames, each suspended at a named
//! continuation. Nothing lives on the native call stack between polls, so a
//! fiber can be serialized whenever `poll` returns and resumed in another
//! process.

mod fault;
mod frame;
mod wait;

#[cfg(test)]
mod proptests;

pub use fault::{Fault, FaultKind};
pub use frame::Frame;
pub use wait::{Item, Need, Outcome, Resumable, Wait, ANY_KIND};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid stack operations. These are programming errors and are never
/// delivered to dialog code as faults.
#[derive(Debug, Error)]
pub enum FiberError {
    #[error("Invalid need: expected {expected:?}, found {actual:?}")]
    InvalidNeed { expected: Need, actual: Need },
    #[error("Continuation {rest} expected an item of kind {expected}, got {actual}")]
    KindMismatch {
        rest: String,
        expected: String,
        actual: String,
    },
    #[error("No frames on the stack")]
    Empty,
    #[error("Continuation {rest} returned without waiting, calling or completing")]
    NotRegistered { rest: String },
    #[error("Continuation {rest} registered more than one suspension")]
    AlreadyRegistered { rest: String },
    #[error("Unhandled fault: {0}")]
    Unhandled(Fault),
    #[error("Item could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where a completed frame's outcome went
#[derive(Debug)]
enum Completion {
    /// Delivered to a chained continuation or the parent frame
    Routed,
    /// The root frame completed successfully
    Finished,
    /// The root frame completed with a fault
    Unhandled(Fault),
}

/// The continuation stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fiber<T> {
    frames: Vec<Frame<T>>,
}

impl<T> Default for Fiber<T> {
    fn default() -> Self {
        Self { frames: Vec::new() }
    }
}

impl<T> Fiber<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: Vec<Frame<T>>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[Frame<T>] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Need of the top frame, or `Done` when the stack is exhausted
    pub fn need(&self) -> Need {
        self.frames.last().map_or(Need::Done, |f| f.wait.need)
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }

    /// Push a frame from outside any continuation.
    ///
    /// Allowed on an empty stack (a new root) or over a frame suspended in
    /// `Wait` (an interruption that returns to the waiting frame).
    pub fn call(&mut self, target: T, method: impl Into<String>, item: Item) -> Result<(), FiberError> {
        if let Some(top) = self.frames.last() {
            if top.wait.need != Need::Wait {
                return Err(FiberError::InvalidNeed {
                    expected: Need::Wait,
                    actual: top.wait.need,
                });
            }
        }
        self.frames.push(Frame::new(target, Wait::ready(method, Ok(item))));
        Ok(())
    }

    /// Deliver an external outcome to the top frame's wait
    pub fn post(&mut self, outcome: Outcome) -> Result<(), FiberError> {
        let top = self.frames.last_mut().ok_or(FiberError::Empty)?;
        if top.wait.need != Need::Wait {
            return Err(FiberError::InvalidNeed {
                expected: Need::Wait,
                actual: top.wait.need,
            });
        }
        top.wait.post(outcome)
    }

    /// Fault the top frame's wait
    pub fn fail(&mut self, fault: Fault) -> Result<(), FiberError> {
        self.post(Err(fault))
    }

    /// Run continuations until the stack waits for input or is exhausted.
    ///
    /// `invoke` runs one continuation: it receives the frame's target, the
    /// continuation name and its outcome, and must register exactly one of
    /// wait, call or done through the handle.
    pub fn poll<F>(&mut self, mut invoke: F) -> Result<Need, FiberError>
    where
        F: FnMut(&mut T, &str, Outcome, &mut Handle<'_, T>) -> Result<(), Fault>,
    {
        loop {
            let Some(index) = self.frames.len().checked_sub(1) else {
                return Ok(Need::Done);
            };
            match self.frames[index].wait.need {
                Need::Poll => {}
                Need::Wait => return Ok(Need::Wait),
                other => {
                    return Err(FiberError::InvalidNeed {
                        expected: Need::Poll,
                        actual: other,
                    })
                }
            }

            let frame = &mut self.frames[index];
            let (rest, outcome) = frame.wait.take()?;
            let Some(mut target) = frame.target.take() else {
                return Err(FiberError::InvalidNeed {
                    expected: Need::Poll,
                    actual: Need::None,
                });
            };

            let mut handle = Handle {
                fiber: &mut *self,
                index,
                registered: false,
                error: None,
                completion: None,
            };
            let result = invoke(&mut target, &rest, outcome, &mut handle);
            let Handle {
                registered,
                error,
                completion,
                ..
            } = handle;

            if let Some(frame) = self.frames.get_mut(index) {
                if frame.target.is_none() {
                    frame.target = Some(target);
                }
            }
            if let Some(error) = error {
                return Err(error);
            }

            match result {
                Ok(()) => {
                    if !registered {
                        return Err(FiberError::NotRegistered { rest });
                    }
                    match completion {
                        Some(Completion::Unhandled(fault)) => return Err(self.unhandled(fault)),
                        Some(Completion::Finished) => {
                            tracing::debug!(rest = %rest, "Root frame completed");
                        }
                        Some(Completion::Routed) | None => {}
                    }
                }
                Err(fault) => {
                    tracing::debug!(rest = %rest, depth = index + 1, error = %fault, "Continuation faulted");
                    self.fault_frame(index, fault)?;
                }
            }

            self.forward_pending()?;
        }
    }

    /// Complete the top frame, routing the outcome to its chain or parent
    fn complete(&mut self, outcome: Outcome) -> Result<Completion, FiberError> {
        let top = self.frames.last_mut().ok_or(FiberError::Empty)?;
        if let Some(next) = top.chain.pop_front() {
            top.wait = Wait::ready(next, outcome);
            return Ok(Completion::Routed);
        }

        self.frames.pop();
        let Some(parent) = self.frames.last_mut() else {
            return Ok(match outcome {
                Ok(_) => Completion::Finished,
                Err(fault) => Completion::Unhandled(fault),
            });
        };

        match parent.wait.need {
            Need::Call => parent.wait.post(outcome)?,
            // Interrupted parent: results are dropped, faults are delivered
            Need::Wait => {
                if let Err(fault) = outcome {
                    parent.wait.post(Err(fault))?;
                }
            }
            other => {
                return Err(FiberError::InvalidNeed {
                    expected: Need::Call,
                    actual: other,
                })
            }
        }
        Ok(Completion::Routed)
    }

    /// A continuation at `index` returned a fault: discard whatever it
    /// pushed and complete its frame with the fault.
    fn fault_frame(&mut self, index: usize, fault: Fault) -> Result<(), FiberError> {
        self.frames.truncate(index + 1);

        if let Some(frame) = self.frames.get_mut(index) {
            if frame.wait.need == Need::Poll {
                frame.wait.replace(Err(fault));
                return Ok(());
            }
            frame.wait.need = Need::None;
            return match self.complete(Err(fault))? {
                Completion::Unhandled(fault) => Err(self.unhandled(fault)),
                Completion::Routed | Completion::Finished => Ok(()),
            };
        }

        // The frame already completed before faulting
        match self.frames.last_mut() {
            Some(parent) if parent.wait.need == Need::Poll => {
                parent.wait.replace(Err(fault));
                Ok(())
            }
            Some(parent) => parent.wait.post(Err(fault)),
            None => Err(self.unhandled(fault)),
        }
    }

    fn forward_pending(&mut self) -> Result<(), FiberError> {
        if let Some(top) = self.frames.last_mut() {
            if top.wait.need == Need::Wait {
                if let Some(item) = top.forward.take() {
                    top.wait.post(Ok(item))?;
                }
            }
        }
        Ok(())
    }

    fn unhandled(&mut self, fault: Fault) -> FiberError {
        tracing::warn!(error = %fault, depth = self.frames.len(), "Fault reached the root; resetting stack");
        self.frames.clear();
        FiberError::Unhandled(fault)
    }
}

/// Capability handed to a running continuation.
///
/// Exposes only the operations valid inside a continuation, so a
/// continuation can never re-enter `poll` on its own fiber.
pub struct Handle<'f, T> {
    fiber: &'f mut Fiber<T>,
    index: usize,
    registered: bool,
    error: Option<FiberError>,
    completion: Option<Completion>,
}

impl<T> Handle<'_, T> {
    /// Depth of the running frame (1 for the root)
    pub fn depth(&self) -> usize {
        self.index + 1
    }

    fn register(&mut self, rest: &str) -> bool {
        if self.error.is_some() {
            return false;
        }
        if self.registered {
            self.error = Some(FiberError::AlreadyRegistered {
                rest: rest.to_string(),
            });
            return false;
        }
        self.registered = true;
        true
    }

    /// Suspend until an item of `kind` is posted, then run `rest`
    pub fn wait(&mut self, rest: &str, kind: &str) {
        if self.register(rest) {
            self.fiber.frames[self.index].wait = Wait::new(rest, kind, Need::Wait);
        }
    }

    /// Push a child frame running `method` with `item`; its completion
    /// (an item of `kind`) resumes this frame at `resume`
    pub fn call(&mut self, target: T, method: &str, item: Item, resume: &str, kind: &str) {
        self.push_child(target, method, item, resume, kind, None);
    }

    /// Like `call`, and post `forward` to the child's first wait
    pub fn forward(
        &mut self,
        target: T,
        method: &str,
        item: Item,
        resume: &str,
        kind: &str,
        forward: Item,
    ) {
        self.push_child(target, method, item, resume, kind, Some(forward));
    }

    fn push_child(
        &mut self,
        target: T,
        method: &str,
        item: Item,
        resume: &str,
        kind: &str,
        forward: Option<Item>,
    ) {
        if self.register(resume) {
            self.fiber.frames[self.index].wait = Wait::new(resume, kind, Need::Call);
            self.fiber
                .frames
                .push(Frame::new(target, Wait::ready(method, Ok(item))).with_forward(forward));
        }
    }

    /// Complete the running frame
    pub fn done(&mut self, outcome: Outcome) {
        if self.register("done") {
            match self.fiber.complete(outcome) {
                Ok(completion) => self.completion = Some(completion),
                Err(e) => self.error = Some(e),
            }
        }
    }

    /// Run `rest` on this frame with its completion before returning to
    /// the parent
    pub fn continue_with(&mut self, rest: &str) {
        if self.registered {
            if self.error.is_none() {
                self.error = Some(FiberError::AlreadyRegistered {
                    rest: rest.to_string(),
                });
            }
            return;
        }
        self.fiber.frames[self.index]
            .chain
            .push_back(rest.to_string());
    }
}
