//! Dialogs: nested units of conversation logic
//!
//! A dialog is plain serde data plus named continuations. Each active
//! dialog owns one fiber frame; the frame records which continuation the
//! dialog is suspended at, so the dialog object itself never holds
//! closures.

mod context;
pub mod prompts;
mod stack;

pub use context::DialogContext;
pub use prompts::{
    Prompt, PromptChoice, PromptConfirm, PromptDouble, PromptNumber, PromptOptions, PromptString,
};
pub use stack::DialogStack;

use crate::fiber::{Fault, Item, Outcome};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Continuation name used to start a dialog
pub const START: &str = "start";

/// Stable name a dialog type is registered and persisted under
pub trait DialogType {
    const TYPE_NAME: &'static str;
}

/// Plain-data view of a dialog, used when the stack is persisted
pub trait Surrogate {
    fn type_name(&self) -> &'static str;
    fn to_state(&self) -> Result<Value, serde_json::Error>;
}

impl<T: DialogType + Serialize> Surrogate for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn to_state(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Conversation logic running on a dialog stack frame
pub trait Dialog: Surrogate + Send + fmt::Debug {
    /// First continuation, run when the dialog is pushed
    fn start(&mut self, ctx: &mut DialogContext<'_, '_>, args: Item) -> Result<(), Fault>;

    /// Run the continuation named `rest`
    fn resume(&mut self, ctx: &mut DialogContext<'_, '_>, rest: &str, outcome: Outcome) -> Result<(), Fault>;

    /// Names `resume` accepts; a restored stack naming anything else is
    /// rejected
    fn continuations(&self) -> &'static [&'static str];
}

/// Fault for a continuation name a dialog does not know
pub fn unknown_continuation(dialog: &dyn Dialog, rest: &str) -> Fault {
    Fault::dialog(format!("{} has no continuation named {rest}", dialog.type_name()))
}
