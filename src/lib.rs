//! Dialog continuation runtime for conversational bots
//!
//! Conversations are nested dialogs on a serializable continuation stack.
//! A turn loads the stack from the bot's state store, resumes the waiting
//! dialog with the inbound message, and persists the stack again before any
//! reply is delivered.

// Errors are documented on the error enums, not per function
#![allow(clippy::missing_errors_doc, clippy::must_use_candidate, clippy::module_name_repetitions)]

pub mod bot_data;
pub mod config;
pub mod dialog;
pub mod fiber;
pub mod luis;
pub mod message;
pub mod runtime;
pub mod scorable;
pub mod serialization;
pub mod session;

pub use bot_data::{BotData, BotDataBag, BotStateStore, InMemoryStateStore};
pub use config::BotConfig;
pub use dialog::{Dialog, DialogContext, DialogStack, DialogType};
pub use fiber::{Fault, FaultKind, Item, Need, Outcome, Resumable};
pub use message::Message;
pub use runtime::{BotRuntime, MessageSink, TurnError, TurnOutcome};
pub use serialization::DialogRegistry;
pub use session::Session;
